//! Operation classes the hooks report, and the sets used to pick the interesting ones.

use serde::Deserialize;

/// File-system operations by IRP major function number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FileOperation {
    Create = 0x00,
    Close = 0x02,
    Read = 0x03,
    Write = 0x04,
    SetInformation = 0x06,
    Cleanup = 0x12,
}

impl FileOperation {
    pub const fn major_function(self) -> u8 {
        self as u8
    }

    pub const fn from_major(major: u8) -> Option<Self> {
        Some(match major {
            0x00 => FileOperation::Create,
            0x02 => FileOperation::Close,
            0x03 => FileOperation::Read,
            0x04 => FileOperation::Write,
            0x06 => FileOperation::SetInformation,
            0x12 => FileOperation::Cleanup,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FileOperation::Create => "create",
            FileOperation::Close => "close",
            FileOperation::Read => "read",
            FileOperation::Write => "write",
            FileOperation::SetInformation => "set_information",
            FileOperation::Cleanup => "cleanup",
        }
    }
}

/// Registry operations by `REG_NOTIFY_CLASS` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum RegistryOperation {
    PreDeleteKey = 0,
    PreSetValueKey = 1,
    PreDeleteValueKey = 2,
    PreSetInformationKey = 3,
    PreRenameKey = 4,
    PreEnumerateKey = 5,
    PreEnumerateValueKey = 6,
    PreQueryKey = 7,
    PreQueryValueKey = 8,
    PreQueryMultipleValueKey = 9,
    PreCreateKey = 10,
    PostCreateKey = 11,
    PreOpenKey = 12,
    PostOpenKey = 13,
    PreKeyHandleClose = 14,
    PostDeleteKey = 15,
    PostSetValueKey = 16,
    PostDeleteValueKey = 17,
    PostSetInformationKey = 18,
    PostRenameKey = 19,
    PreCreateKeyEx = 26,
    PostCreateKeyEx = 27,
    PreOpenKeyEx = 28,
    PostOpenKeyEx = 29,
}

impl RegistryOperation {
    pub const fn notify_class(self) -> u32 {
        self as u32
    }

    pub const fn from_notify_class(class: u32) -> Option<Self> {
        use RegistryOperation::*;
        Some(match class {
            0 => PreDeleteKey,
            1 => PreSetValueKey,
            2 => PreDeleteValueKey,
            3 => PreSetInformationKey,
            4 => PreRenameKey,
            5 => PreEnumerateKey,
            6 => PreEnumerateValueKey,
            7 => PreQueryKey,
            8 => PreQueryValueKey,
            9 => PreQueryMultipleValueKey,
            10 => PreCreateKey,
            11 => PostCreateKey,
            12 => PreOpenKey,
            13 => PostOpenKey,
            14 => PreKeyHandleClose,
            15 => PostDeleteKey,
            16 => PostSetValueKey,
            17 => PostDeleteValueKey,
            18 => PostSetInformationKey,
            19 => PostRenameKey,
            26 => PreCreateKeyEx,
            27 => PostCreateKeyEx,
            28 => PreOpenKeyEx,
            29 => PostOpenKeyEx,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        use RegistryOperation::*;
        match self {
            PreDeleteKey => "pre_delete_key",
            PreSetValueKey => "pre_set_value_key",
            PreDeleteValueKey => "pre_delete_value_key",
            PreSetInformationKey => "pre_set_information_key",
            PreRenameKey => "pre_rename_key",
            PreEnumerateKey => "pre_enumerate_key",
            PreEnumerateValueKey => "pre_enumerate_value_key",
            PreQueryKey => "pre_query_key",
            PreQueryValueKey => "pre_query_value_key",
            PreQueryMultipleValueKey => "pre_query_multiple_value_key",
            PreCreateKey => "pre_create_key",
            PostCreateKey => "post_create_key",
            PreOpenKey => "pre_open_key",
            PostOpenKey => "post_open_key",
            PreKeyHandleClose => "pre_key_handle_close",
            PostDeleteKey => "post_delete_key",
            PostSetValueKey => "post_set_value_key",
            PostDeleteValueKey => "post_delete_value_key",
            PostSetInformationKey => "post_set_information_key",
            PostRenameKey => "post_rename_key",
            PreCreateKeyEx => "pre_create_key_ex",
            PostCreateKeyEx => "post_create_key_ex",
            PreOpenKeyEx => "pre_open_key_ex",
            PostOpenKeyEx => "post_open_key_ex",
        }
    }
}

/// Bitmask over operation numbers below 64. Larger numbers are never members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationSet(u64);

impl OperationSet {
    pub const EMPTY: Self = OperationSet(0);

    #[must_use]
    pub const fn with(self, raw: u32) -> Self {
        if raw < u64::BITS {
            OperationSet(self.0 | (1 << raw))
        } else {
            self
        }
    }

    pub const fn contains(self, raw: u32) -> bool {
        raw < u64::BITS && self.0 & (1 << raw) != 0
    }

    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<FileOperation> for OperationSet {
    fn from_iter<I: IntoIterator<Item = FileOperation>>(iter: I) -> Self {
        iter.into_iter()
            .fold(OperationSet::EMPTY, |set, op| set.with(u32::from(op.major_function())))
    }
}

impl FromIterator<RegistryOperation> for OperationSet {
    fn from_iter<I: IntoIterator<Item = RegistryOperation>>(iter: I) -> Self {
        iter.into_iter()
            .fold(OperationSet::EMPTY, |set, op| set.with(op.notify_class()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_membership_follows_raw_numbers() {
        let set: OperationSet = [FileOperation::Create, FileOperation::Write].into_iter().collect();
        assert!(set.contains(0x00));
        assert!(set.contains(0x04));
        assert!(!set.contains(0x03));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn out_of_range_classes_are_ignored() {
        let set = OperationSet::EMPTY.with(64).with(200);
        assert!(set.is_empty());
        assert!(!set.contains(64));
    }

    #[test]
    fn notify_classes_round_trip() {
        for class in 0..64 {
            if let Some(op) = RegistryOperation::from_notify_class(class) {
                assert_eq!(op.notify_class(), class);
            }
        }
        assert_eq!(RegistryOperation::from_notify_class(20), None);
        assert_eq!(FileOperation::from_major(0x12), Some(FileOperation::Cleanup));
    }
}
