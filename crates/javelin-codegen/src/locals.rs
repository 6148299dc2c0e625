//! Local variable slots for one method.

use javelin_types::slot_width;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub slot: u16,
    pub descriptor: String,
}

/// Name to slot mapping, scoped by lexical block.
///
/// Slots are handed out monotonically: leaving a scope hides its names but
/// never returns their slots, so `max_locals` is simply the next free slot.
#[derive(Debug)]
pub struct LocalTable {
    scopes: Vec<Vec<Local>>,
    next_slot: u16,
    next_temp: u32,
}

impl LocalTable {
    /// Slot 0 holds `this` unless the method is static.
    pub fn new(is_static: bool) -> Self {
        let mut table = Self {
            scopes: vec![Vec::new()],
            next_slot: 0,
            next_temp: 0,
        };
        if !is_static {
            table.declare("this", javelin_types::desc::OBJECT);
        }
        table
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn exit_scope(&mut self) {
        // The outermost (parameter) scope lives as long as the method
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Allocate a fresh slot for `name` in the innermost scope.
    pub fn declare(&mut self, name: &str, descriptor: &str) -> u16 {
        let slot = self.next_slot;
        self.next_slot += slot_width(descriptor).max(1);
        log::trace!("local {} -> slot {} ({})", name, slot, descriptor);

        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Local {
                name: name.to_string(),
                slot,
                descriptor: descriptor.to_string(),
            });
        }
        slot
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&Local> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|local| local.name == name)
    }

    /// Allocate a compiler temporary named `$<prefix><n>`. The `$` keeps
    /// it out of the way of any source identifier.
    pub fn temp(&mut self, prefix: &str, descriptor: &str) -> u16 {
        let name = format!("${}{}", prefix, self.next_temp);
        self.next_temp += 1;
        self.declare(&name, descriptor)
    }

    pub fn max_locals(&self) -> u16 {
        self.next_slot
    }
}
