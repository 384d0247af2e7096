/*!
 The wire handle table: an append-only mapping from handles to the
 entities decoded so far.
*/

use crate::error::objectstream::ObjectStreamError;
use crate::objectstream::models::Entity;

/// The first handle assigned in a stream; later handles increment by one.
pub(crate) const BASE_WIRE_HANDLE: u32 = 0x7E0000;

/// An append-only table of decoded entities, indexed by wire handle.
///
/// Handles are assigned in the exact order the grammar dictates, so two
/// decodes of the same bytes produce identical handle assignments. The
/// table never shrinks; the `TC_RESET` marker, which would clear it, is
/// not part of the supported grammar.
#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    entries: Vec<Entity>,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an entity and return its newly assigned handle.
    pub(crate) fn allocate(&mut self, entity: Entity) -> u32 {
        let handle = BASE_WIRE_HANDLE + self.entries.len() as u32;
        self.entries.push(entity);
        handle
    }

    /// Look up the entity a handle refers to.
    pub(crate) fn resolve(&self, handle: u32) -> Result<&Entity, ObjectStreamError> {
        self.entries
            .get(Self::index(handle)?)
            .ok_or(ObjectStreamError::BadHandle(handle))
    }

    /// Mutable access to the entity a handle refers to, used to fill
    /// entities that are decoded incrementally.
    pub(crate) fn get_mut(&mut self, handle: u32) -> Result<&mut Entity, ObjectStreamError> {
        self.entries
            .get_mut(Self::index(handle)?)
            .ok_or(ObjectStreamError::BadHandle(handle))
    }

    /// Patch a reserved slot with its finished entity.
    pub(crate) fn replace(
        &mut self,
        handle: u32,
        entity: Entity,
    ) -> Result<(), ObjectStreamError> {
        *self.get_mut(handle)? = entity;
        Ok(())
    }

    /// Number of handles allocated so far.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn index(handle: u32) -> Result<usize, ObjectStreamError> {
        handle
            .checked_sub(BASE_WIRE_HANDLE)
            .map(|idx| idx as usize)
            .ok_or(ObjectStreamError::BadHandle(handle))
    }
}
