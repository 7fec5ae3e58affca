//! Audit tool for the ddcompat binary interface

use clap::{Parser, Subcommand, ValueEnum};
use ddraw::ddi::thunks::{adapter_substitutes, device_substitutes};
use ddraw::ddi::{D3DDDI_ADAPTERFUNCS, DEVICE_FUNCS_FAMILY, device_funcs_layout};
use ddraw::exports::{FORWARDED_MODULES, proc_count};
use ddraw::vtable::{
    IDIRECT3DMATERIAL, IDIRECT3DMATERIAL2, IDIRECT3DMATERIAL3, IDIRECTDRAWSURFACE, IDIRECTDRAWSURFACE2,
    IDIRECTDRAWSURFACE3, IDIRECTDRAWSURFACE4, IDIRECTDRAWSURFACE7, IUNKNOWN,
};
use ddraw::{InterfaceDesc, Substitutes};

#[derive(Parser)]
#[command(name = "ddcompat")]
#[command(about = "Inspect the tables and exports ddcompat intercepts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the slot layout of an interface
    Layout {
        /// Interface name (e.g., IDirectDrawSurface7, D3DDDI_DEVICEFUNCS)
        interface: String,

        /// Only list slots the shim replaces
        #[arg(short, long)]
        intercepted: bool,
    },

    /// List the D3DDDI_DEVICEFUNCS layouts and the interface versions that select them
    Families,

    /// List the forwarded exports
    Exports {
        /// Only list the exports of this library
        #[arg(short, long, value_enum)]
        module: Option<Module>,
    },

    /// Check that every interface family keeps its smaller versions' slot order
    Check,

    /// List the known interfaces
    #[command(alias = "ls")]
    List,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Module {
    #[value(name = "ddraw")]
    Ddraw,
    #[value(name = "dciman32")]
    Dciman32,
}

impl Module {
    fn file_name(&self) -> &'static str {
        match self {
            Module::Ddraw => "ddraw.dll",
            Module::Dciman32 => "dciman32.dll",
        }
    }
}

/// Representative interface version for each device table layout
const FAMILY_VERSIONS: [(u32, &str); 5] = [
    (0x000C, "Vista"),
    (0x2003, "Windows 7"),
    (0x3001, "Windows 8"),
    (0x4002, "Windows 8.1"),
    (0x5002, "Windows 10"),
];

fn known_interfaces() -> Vec<&'static InterfaceDesc> {
    let mut interfaces = vec![
        &IUNKNOWN,
        &IDIRECT3DMATERIAL,
        &IDIRECT3DMATERIAL2,
        &IDIRECT3DMATERIAL3,
        &IDIRECTDRAWSURFACE,
        &IDIRECTDRAWSURFACE2,
        &IDIRECTDRAWSURFACE3,
        &IDIRECTDRAWSURFACE4,
        &IDIRECTDRAWSURFACE7,
        &D3DDDI_ADAPTERFUNCS,
    ];
    interfaces.extend(DEVICE_FUNCS_FAMILY.iter().copied());
    interfaces
}

fn find_interface(name: &str) -> Option<&'static InterfaceDesc> {
    known_interfaces()
        .into_iter()
        .find(|interface| interface.name.eq_ignore_ascii_case(name))
}

fn substitutes_for(interface: &InterfaceDesc) -> Substitutes {
    if interface.extends(&D3DDDI_ADAPTERFUNCS) {
        adapter_substitutes()
    } else if DEVICE_FUNCS_FAMILY.iter().any(|layout| interface.extends(layout)) {
        device_substitutes()
    } else {
        Substitutes::new()
    }
}

fn print_layout(name: String, intercepted: bool) -> Result<(), String> {
    let interface = find_interface(&name).ok_or_else(|| format!("Unknown interface: {name}"))?;
    let substitutes = substitutes_for(interface);

    println!("{} ({} slots)", interface.name, interface.slot_count());
    for (index, member) in interface.slots().into_iter().enumerate() {
        let hooked = substitutes.get(member).is_some();
        if intercepted && !hooked {
            continue;
        }
        println!(
            "  [{:3}] {:<40} {:<32}{}",
            index,
            member,
            interface.introduced_by(index).unwrap_or("?"),
            if hooked { " *" } else { "" }
        );
    }
    Ok(())
}

fn print_families() -> Result<(), String> {
    for (version, release) in FAMILY_VERSIONS {
        let layout = device_funcs_layout(version);
        println!(
            "0x{:04x} {:<12} {:<36} {} slots",
            version,
            release,
            layout.name,
            layout.slot_count()
        );
    }
    Ok(())
}

fn print_exports(module: Option<Module>) -> Result<(), String> {
    for forwarded in &FORWARDED_MODULES {
        if module.is_some_and(|m| m.file_name() != forwarded.module) {
            continue;
        }
        println!("{} ({} exports)", forwarded.module, forwarded.procs.len());
        for name in forwarded.procs {
            println!("  {name}");
        }
    }
    if module.is_none() {
        println!("Total: {}", proc_count());
    }
    Ok(())
}

fn check_families() -> Result<(), String> {
    let mut failures = Vec::new();
    for interface in known_interfaces() {
        let Some(base) = interface.base else {
            continue;
        };
        let slots = interface.slots();
        let base_slots = base.slots();
        if slots[..base_slots.len()] != base_slots[..] {
            failures.push(format!("{} does not start with {}", interface.name, base.name));
        }
    }
    for pair in DEVICE_FUNCS_FAMILY.windows(2) {
        if !pair[1].extends(pair[0]) {
            failures.push(format!("{} does not extend {}", pair[1].name, pair[0].name));
        }
    }

    let substitutes = device_substitutes();
    let newest = DEVICE_FUNCS_FAMILY[DEVICE_FUNCS_FAMILY.len() - 1];
    for member in newest.slots() {
        if substitutes.get(member).is_none() {
            continue;
        }
        let indices: Vec<_> = DEVICE_FUNCS_FAMILY
            .iter()
            .filter_map(|layout| layout.slot_index(member))
            .collect();
        if indices.windows(2).any(|pair| pair[0] != pair[1]) {
            failures.push(format!("{member} moves between device table layouts"));
        }
    }

    if failures.is_empty() {
        println!("All {} interfaces consistent", known_interfaces().len());
        Ok(())
    } else {
        Err(failures.join("\n"))
    }
}

fn list_interfaces() -> Result<(), String> {
    for interface in known_interfaces() {
        println!(
            "{:<36} {:>4} slots  base: {}",
            interface.name,
            interface.slot_count(),
            interface.base.map_or("-", |base| base.name)
        );
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Layout {
            interface,
            intercepted,
        } => print_layout(interface, intercepted),
        Commands::Families => print_families(),
        Commands::Exports { module } => print_exports(module),
        Commands::Check => check_families(),
        Commands::List => list_interfaces(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
