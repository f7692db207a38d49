//! Static tables between operation kinds and vendor wire commands.

use crate::operation::OperationKind;
use std::borrow::Borrow;

/// Ordered (kind, command) pairs, scanned linearly in both directions.
///
/// Tables are small and built as `static` data, so they can be shared by every
/// adapter instance without synchronization. Entries must be unique per
/// direction; the first match wins.
#[derive(Debug)]
pub struct CommandTable<C: 'static> {
    entries: &'static [(OperationKind, C)],
}

impl<C: 'static> CommandTable<C> {
    pub const fn new(entries: &'static [(OperationKind, C)]) -> Self {
        Self { entries }
    }

    pub fn to_wire(&self, kind: OperationKind) -> Option<&'static C> {
        self.entries.iter().find(|(k, _)| *k == kind).map(|(_, c)| c)
    }

    /// Reverse lookup. `None` means the command is unknown to this vendor table.
    pub fn from_wire<Q>(&self, command: &Q) -> Option<OperationKind>
    where
        C: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries
            .iter()
            .find(|(_, c)| c.borrow() == command)
            .map(|(k, _)| *k)
    }

    pub fn entries(&self) -> &'static [(OperationKind, C)] {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static CODES: CommandTable<i64> = CommandTable::new(&[
        (OperationKind::GetStatus, 0),
        (OperationKind::GetAttributes, 1),
        (OperationKind::StartPrint, 128),
    ]);

    static METHODS: CommandTable<&'static str> = CommandTable::new(&[
        (OperationKind::GetStatus, "printer.objects.query"),
        (OperationKind::PausePrint, "printer.print.pause"),
    ]);

    #[test]
    fn test_integer_table_lookup() {
        assert_eq!(CODES.to_wire(OperationKind::StartPrint), Some(&128));
        assert_eq!(CODES.from_wire(&1), Some(OperationKind::GetAttributes));
        assert_eq!(CODES.from_wire(&999), None);
        assert_eq!(CODES.to_wire(OperationKind::MoveAxis), None);
    }

    #[test]
    fn test_string_table_lookup_by_str() {
        let method = String::from("printer.print.pause");
        assert_eq!(METHODS.from_wire(method.as_str()), Some(OperationKind::PausePrint));
        assert_eq!(METHODS.from_wire("server.info"), None);
    }
}
