use std::fmt::Write as _;
use std::io::{Read, Seek, SeekFrom};

use crate::error::MfsError;

/// Bytes of the boot sector read at open; every BPB field this tool uses
/// lives in the first 82 bytes.
pub const BOOT_SECTOR_SIZE: usize = 512;

/// Decoded BIOS Parameter Block fields of a FAT32 volume.
///
/// Offsets follow the FAT32 layout: all fields are little-endian and read
/// from fixed positions in the boot sector.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// OEM name (bytes 3..11).
    pub oem_name: [u8; 8],
    /// Bytes per sector (typically 512).
    pub bytes_per_sector: u16,
    /// Sectors per cluster.
    pub sectors_per_cluster: u8,
    /// Number of reserved sectors before the first FAT.
    pub reserved_sectors: u16,
    /// Number of FATs (typically 2).
    pub num_fats: u8,
    /// Root directory entry count (always 0 on FAT32, kept for the record).
    pub root_entry_count: u16,
    /// Sectors per FAT.
    pub fat_size_32: u32,
    /// First cluster of the root directory.
    pub root_cluster: u32,
    /// Volume label (bytes 71..82).
    pub volume_label: [u8; 11],
}

impl Geometry {
    /// Decode the BPB from the boot sector of `device`.
    ///
    /// No validation beyond structural decode: a volume that lies about its
    /// geometry fails later, at the first seek it sends out of range.
    pub fn read_from<D: Read + Seek>(device: &mut D) -> Result<Self, MfsError> {
        device.seek(SeekFrom::Start(0))?;
        let mut boot = [0u8; BOOT_SECTOR_SIZE];
        device.read_exact(&mut boot)?;

        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(&boot[3..11]);
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&boot[71..82]);

        Ok(Self {
            oem_name,
            bytes_per_sector: u16::from_le_bytes([boot[11], boot[12]]),
            sectors_per_cluster: boot[13],
            reserved_sectors: u16::from_le_bytes([boot[14], boot[15]]),
            num_fats: boot[16],
            root_entry_count: u16::from_le_bytes([boot[17], boot[18]]),
            fat_size_32: u32::from_le_bytes([boot[36], boot[37], boot[38], boot[39]]),
            root_cluster: u32::from_le_bytes([boot[44], boot[45], boot[46], boot[47]]),
            volume_label,
        })
    }

    /// Absolute byte offset of the first data byte of `cluster`.
    ///
    /// Valid for cluster numbers >= 2; callers substitute the root cluster
    /// for 0 before calling.
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        let sector = self.bytes_per_sector as u64;
        (cluster as u64 - 2) * sector
            + self.reserved_sectors as u64 * sector
            + self.num_fats as u64 * self.fat_size_32 as u64 * sector
    }

    /// Absolute byte offset of the 32-bit FAT entry for `cluster`.
    pub fn fat_offset(&self, cluster: u32) -> u64 {
        self.reserved_sectors as u64 * self.bytes_per_sector as u64 + cluster as u64 * 4
    }

    /// Render the `info` listing: the five BPB fields in hexadecimal and
    /// decimal, in the program's fixed column layout.
    pub fn info_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "--BPB_BytsPerSec:      hex: {:<#10x}  base10: {}",
            self.bytes_per_sector, self.bytes_per_sector
        );
        let _ = writeln!(
            text,
            "--BPB_SecPerClus:      hex: {:<#10x}  base10: {}",
            self.sectors_per_cluster, self.sectors_per_cluster
        );
        let _ = writeln!(
            text,
            "--BPB_RsvdSecCnt:      hex: {:<#10x}  base10: {}",
            self.reserved_sectors, self.reserved_sectors
        );
        let _ = writeln!(
            text,
            "--BPB_NumFATS:         hex: {:<#10x}  base10: {}",
            self.num_fats, self.num_fats
        );
        let _ = writeln!(
            text,
            "--BPB_FATSz32:         hex: {:<#10x}  base10: {}",
            self.fat_size_32, self.fat_size_32
        );
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn boot_sector() -> [u8; BOOT_SECTOR_SIZE] {
        let mut boot = [0u8; BOOT_SECTOR_SIZE];
        boot[3..11].copy_from_slice(b"MSDOS5.0");
        boot[11..13].copy_from_slice(&512u16.to_le_bytes());
        boot[13] = 1;
        boot[14..16].copy_from_slice(&32u16.to_le_bytes());
        boot[16] = 2;
        boot[36..40].copy_from_slice(&1009u32.to_le_bytes());
        boot[44..48].copy_from_slice(&2u32.to_le_bytes());
        boot[71..82].copy_from_slice(b"TESTVOLUME ");
        boot
    }

    #[test]
    fn test_decode_bpb() {
        let mut device = Cursor::new(boot_sector().to_vec());
        let geo = Geometry::read_from(&mut device).unwrap();
        assert_eq!(&geo.oem_name, b"MSDOS5.0");
        assert_eq!(geo.bytes_per_sector, 512);
        assert_eq!(geo.sectors_per_cluster, 1);
        assert_eq!(geo.reserved_sectors, 32);
        assert_eq!(geo.num_fats, 2);
        assert_eq!(geo.root_entry_count, 0);
        assert_eq!(geo.fat_size_32, 1009);
        assert_eq!(geo.root_cluster, 2);
        assert_eq!(&geo.volume_label, b"TESTVOLUME ");
    }

    #[test]
    fn test_cluster_offset_formula() {
        let mut device = Cursor::new(boot_sector().to_vec());
        let geo = Geometry::read_from(&mut device).unwrap();
        // (N - 2) * S + R * S + F * Z * S
        for cluster in [2u32, 3, 17, 4096] {
            let expected = (cluster as u64 - 2) * 512 + 32 * 512 + 2 * 1009 * 512;
            assert_eq!(geo.cluster_offset(cluster), expected);
        }
    }

    #[test]
    fn test_fat_offset() {
        let mut device = Cursor::new(boot_sector().to_vec());
        let geo = Geometry::read_from(&mut device).unwrap();
        assert_eq!(geo.fat_offset(0), 32 * 512);
        assert_eq!(geo.fat_offset(5), 32 * 512 + 20);
    }

    #[test]
    fn test_info_text_layout() {
        let mut device = Cursor::new(boot_sector().to_vec());
        let geo = Geometry::read_from(&mut device).unwrap();
        let text = geo.info_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "--BPB_BytsPerSec:      hex: 0x200       base10: 512"
        );
        assert_eq!(
            lines[1],
            "--BPB_SecPerClus:      hex: 0x1         base10: 1"
        );
        assert_eq!(
            lines[4],
            "--BPB_FATSz32:         hex: 0x3f1       base10: 1009"
        );
    }
}
