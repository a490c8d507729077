//! 8.3 filename normalization and matching.
//!
//! FAT directory entries store names as a fixed 11-byte field: 8 bytes of
//! basename and 3 bytes of extension, space-padded and uppercase. User input
//! arrives as `NAME` or `NAME.EXT` in any case; matching normalizes the
//! input and compares byte-for-byte against the raw field.

/// Length of the on-disk name field.
pub const NAME_LEN: usize = 11;

/// Expand a user token into its on-disk 11-byte 8.3 form.
///
/// The basename (up to 8 bytes before the first `.`) lands at positions
/// 0..8, the extension (up to 3 bytes) at 8..11, with ASCII space padding
/// and ASCII uppercasing. Non-ASCII bytes pass through unchanged.
pub fn expand(input: &str) -> [u8; NAME_LEN] {
    let mut expanded = [b' '; NAME_LEN];

    let (base, ext) = match input.split_once('.') {
        Some((base, ext)) => (base, Some(ext)),
        None => (input, None),
    };

    for (i, b) in base.bytes().take(8).enumerate() {
        expanded[i] = b;
    }
    if let Some(ext) = ext {
        for (i, b) in ext.bytes().take(3).enumerate() {
            expanded[8 + i] = b;
        }
    }
    for b in &mut expanded {
        *b = b.to_ascii_uppercase();
    }
    expanded
}

/// Compare a user token against a raw on-disk name field.
///
/// Input starting with `..` matches only the `..` entry (by its first two
/// bytes); everything else goes through [`expand`].
pub fn matches(input: &str, disk_name: &[u8; NAME_LEN]) -> bool {
    if input.starts_with("..") {
        return disk_name.starts_with(b"..");
    }
    expand(input) == *disk_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        assert_eq!(&expand("foo.txt"), b"FOO     TXT");
        assert_eq!(&expand("BAR"), b"BAR        ");
        assert_eq!(&expand("a.b"), b"A       B  ");
        assert_eq!(&expand("kernel.sys"), b"KERNEL  SYS");
    }

    #[test]
    fn test_expand_truncates() {
        // Basename over 8 bytes and extension over 3 are clipped.
        assert_eq!(&expand("longbasename.text"), b"LONGBASETEX");
    }

    #[test]
    fn test_match_case_insensitive() {
        assert!(matches("foo.txt", b"FOO     TXT"));
        assert!(matches("FOO.TXT", b"FOO     TXT"));
        assert!(matches("Foo.Txt", b"FOO     TXT"));
        assert!(!matches("foo.txt", b"FOO     BIN"));
        assert!(!matches("foo", b"FOO     TXT"));
    }

    #[test]
    fn test_match_dotdot() {
        assert!(matches("..", b"..         "));
        assert!(!matches("..", b"FOO     TXT"));
        // A bare "." normalizes to all spaces and matches nothing.
        assert!(!matches(".", b".          "));
    }
}
