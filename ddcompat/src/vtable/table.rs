//! Dispatch table construction and installation

use super::InterfaceDesc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Substitute entry points keyed by member name
///
/// A substitute is declared once by name and lands in every interface version exposing that
/// member.
#[derive(Default, Clone, Debug)]
pub struct Substitutes {
    entries: Vec<(&'static str, usize)>,
}

impl Substitutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, member: &'static str, address: usize) -> Self {
        self.insert(member, address);
        self
    }

    pub fn insert(&mut self, member: &'static str, address: usize) {
        match self.entries.iter_mut().find(|(name, _)| *name == member) {
            Some(entry) => entry.1 = address,
            None => self.entries.push((member, address)),
        }
    }

    pub fn get(&self, member: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(name, _)| *name == member)
            .map(|&(_, address)| address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains_address(&self, address: usize) -> bool {
        self.entries.iter().any(|&(_, a)| a == address)
    }
}

/// Original slot values captured when a table was intercepted
#[derive(Debug)]
pub struct OriginalTable {
    interface: &'static InterfaceDesc,
    slots: Box<[usize]>,
}

impl OriginalTable {
    pub fn new(interface: &'static InterfaceDesc, slots: Box<[usize]>) -> Self {
        debug_assert_eq!(slots.len(), interface.slot_count());
        Self { interface, slots }
    }

    pub fn interface(&self) -> &'static InterfaceDesc {
        self.interface
    }

    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Original pointer of `member`, `None` when the member is absent or the slot was null
    pub fn get(&self, member: &str) -> Option<usize> {
        self.interface
            .slot_index(member)
            .map(|index| self.slots[index])
            .filter(|&address| address != 0)
    }

    /// Typed original of `member`
    ///
    /// # Safety
    /// `F` must be the function pointer type of that slot.
    pub unsafe fn typed<F: Copy>(&self, member: &str) -> Option<F> {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
        self.get(member)
            .map(|address| unsafe { std::mem::transmute_copy::<usize, F>(&address) })
    }
}

/// A built dispatch table
pub struct DispatchTable {
    slots: Box<[usize]>,
}

impl DispatchTable {
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn as_ptr(&self) -> *const usize {
        self.slots.as_ptr()
    }
}

struct ObjectTable {
    table: DispatchTable,
    originals: Arc<OriginalTable>,
}

#[derive(Default)]
struct InterceptorState {
    /// In-place installs, keyed by owning module
    in_place: HashMap<usize, Arc<OriginalTable>>,
    /// Object installs, keyed by the object's original table address
    objects: HashMap<usize, ObjectTable>,
    /// Built table address to the original table address it replaces
    built: HashMap<usize, usize>,
}

/// Installs substitutes into dispatch tables of one interface version
pub struct Interceptor {
    interface: &'static InterfaceDesc,
    substitutes: Substitutes,
    opt_out: HashSet<&'static str>,
    state: Mutex<InterceptorState>,
}

impl Interceptor {
    pub fn new(interface: &'static InterfaceDesc, substitutes: Substitutes) -> Self {
        Self {
            interface,
            substitutes,
            opt_out: HashSet::new(),
            state: Mutex::new(InterceptorState::default()),
        }
    }

    /// Leaves `members` pointing at the original even when a substitute exists
    pub fn with_opt_out(mut self, members: &[&'static str]) -> Self {
        self.opt_out.extend(members.iter().copied());
        self
    }

    pub fn interface(&self) -> &'static InterfaceDesc {
        self.interface
    }

    /// Substitute for `member`, if intercepted
    pub fn substitute(&self, member: &str) -> Option<usize> {
        if self.opt_out.contains(member) {
            return None;
        }
        self.substitutes.get(member)
    }

    /// Builds a table from `original`, one slot per member in table order
    ///
    /// Intercepted members get their substitute unless the original slot is null; a null slot
    /// tells the runtime the member is unimplemented and stays null.
    pub fn build(&self, original: &[usize]) -> DispatchTable {
        let slots = self
            .interface
            .slots()
            .into_iter()
            .zip(original.iter().copied())
            .map(|(member, address)| match self.substitute(member) {
                Some(substitute) if address != 0 => substitute,
                _ => address,
            })
            .collect();
        DispatchTable { slots }
    }

    /// Intercepts a driver-provided table in place and returns the captured originals
    ///
    /// Re-installing over a table that already holds our substitutes keeps the originals
    /// captured the first time for `owner`, so substitutes never forward to themselves.
    ///
    /// # Safety
    /// `table` must point to `interface().slot_count()` writable slots.
    pub unsafe fn install_in_place(&self, owner: usize, table: *mut usize) -> Arc<OriginalTable> {
        let count = self.interface.slot_count();
        let current = unsafe { std::slice::from_raw_parts_mut(table, count) };
        let mut state = self.state.lock();
        let previous = state.in_place.get(&owner).cloned();

        let captured: Box<[usize]> = current
            .iter()
            .enumerate()
            .map(|(index, &address)| {
                let ours = self.substitutes.contains_address(address);
                match (&previous, ours) {
                    (Some(previous), true) => previous.slots[index],
                    (None, true) => 0,
                    (_, false) => address,
                }
            })
            .collect();

        let built = self.build(&captured);
        for (slot, &address) in current.iter_mut().zip(built.slots()) {
            if address != 0 {
                *slot = address;
            }
        }

        let originals = Arc::new(OriginalTable::new(self.interface, captured));
        state.in_place.insert(owner, Arc::clone(&originals));
        originals
    }

    /// Originals captured for `owner` by [`Interceptor::install_in_place`]
    pub fn captured(&self, owner: usize) -> Option<Arc<OriginalTable>> {
        self.state.lock().in_place.get(&owner).cloned()
    }

    /// Points `object`'s table pointer at a built table and returns the originals
    ///
    /// Built tables are cached per original table, so every object sharing a table shares the
    /// replacement. An object already pointing at one of our tables is left alone.
    ///
    /// # Safety
    /// `object` must point to a live object whose first field is a pointer to a table of at
    /// least `interface().slot_count()` slots.
    pub unsafe fn install_on_object(&self, object: *mut *const usize) -> Arc<OriginalTable> {
        let mut state = self.state.lock();
        let mut vtable = unsafe { *object } as usize;
        if let Some(&original) = state.built.get(&vtable) {
            vtable = original;
        }

        if let Some(existing) = state.objects.get(&vtable) {
            unsafe { *object = existing.table.as_ptr() };
            return Arc::clone(&existing.originals);
        }

        let count = self.interface.slot_count();
        let slots: Box<[usize]> =
            unsafe { std::slice::from_raw_parts(vtable as *const usize, count) }.into();
        let table = self.build(&slots);
        let originals = Arc::new(OriginalTable::new(self.interface, slots));

        unsafe { *object = table.as_ptr() };
        state.built.insert(table.as_ptr() as usize, vtable);
        state.objects.insert(
            vtable,
            ObjectTable {
                table,
                originals: Arc::clone(&originals),
            },
        );
        originals
    }

    /// Points `object` back at its original table
    ///
    /// # Safety
    /// Same as [`Interceptor::install_on_object`].
    pub unsafe fn restore_object(&self, object: *mut *const usize) -> bool {
        let state = self.state.lock();
        let vtable = unsafe { *object } as usize;
        match state.built.get(&vtable) {
            Some(&original) => {
                unsafe { *object = original as *const usize };
                true
            }
            None => false,
        }
    }
}
