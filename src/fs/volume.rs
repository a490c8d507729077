use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace};

use crate::error::MfsError;

use super::dir::{
    DirectoryCache, RawDirEntry, ATTR_DIRECTORY, DIR_BLOCK_SIZE, DIR_ENTRIES, ENTRY_DELETED,
};
use super::geometry::Geometry;
use super::names;

/// FAT32 entries are masked to 28 bits before interpretation.
const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;
/// Masked values at or above this mark the end of a cluster chain.
const END_OF_CHAIN: u32 = 0x0FFF_FFF8;
/// Masked values at or above this are bad/reserved markers.
const BAD_CLUSTER: u32 = 0x0FFF_FFF0;

/// An open FAT32 volume: the image device, its decoded geometry, and the
/// 16-entry cache of the currently visited directory.
///
/// Generic over the device so tests can drive `Cursor<Vec<u8>>` images and
/// the shell can drive a read+write [`std::fs::File`].
pub struct Fat32Volume<D> {
    device: D,
    geometry: Geometry,
    dir: DirectoryCache,
    /// The 11-byte names seen at open time, slot i holding entry i's name.
    /// `undelete` restores tombstoned first bytes from here.
    original_names: [[u8; names::NAME_LEN]; DIR_ENTRIES],
}

impl Fat32Volume<std::fs::File> {
    /// Open an image file on the host in read+write mode.
    pub fn open_path(path: &Path) -> Result<Self, MfsError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|_| MfsError::ImageNotFound(path.display().to_string()))?;
        Self::open(file)
    }
}

impl<D: Read + Write + Seek> Fat32Volume<D> {
    /// Open a FAT32 volume on any seekable read+write device.
    ///
    /// Decodes the BPB, loads the root directory block, and captures the
    /// original name of every root entry for later recovery.
    pub fn open(mut device: D) -> Result<Self, MfsError> {
        let geometry = Geometry::read_from(&mut device)?;
        debug!(
            "opened FAT32 volume: oem={:?} label={:?} \
             bytes_per_sector={} sectors_per_cluster={} reserved={} fats={} fat_size={} root_cluster={}",
            String::from_utf8_lossy(&geometry.oem_name),
            String::from_utf8_lossy(&geometry.volume_label),
            geometry.bytes_per_sector,
            geometry.sectors_per_cluster,
            geometry.reserved_sectors,
            geometry.num_fats,
            geometry.fat_size_32,
            geometry.root_cluster,
        );

        let root_offset = geometry.cluster_offset(geometry.root_cluster);
        device.seek(SeekFrom::Start(root_offset))?;
        let mut block = [0u8; DIR_BLOCK_SIZE];
        device.read_exact(&mut block)?;
        let dir = DirectoryCache::from_block(&block, root_offset);

        let mut original_names = [[0u8; names::NAME_LEN]; DIR_ENTRIES];
        for (slot, entry) in original_names.iter_mut().zip(dir.entries()) {
            *slot = entry.name();
        }

        Ok(Self {
            device,
            geometry,
            dir,
            original_names,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Consume the volume and hand the device back (used by tests to
    /// inspect mutated image bytes).
    pub fn into_device(self) -> D {
        self.device
    }

    /// Names visible to `ls`: listable attributes only, tombstones skipped.
    pub fn list(&self) -> Vec<[u8; names::NAME_LEN]> {
        self.dir
            .entries()
            .filter(|entry| entry.is_listable() && !entry.is_deleted())
            .map(|entry| entry.name())
            .collect()
    }

    /// Resolve a name in the current directory and return a copy of its
    /// entry.
    pub fn stat(&self, name: &str) -> Result<RawDirEntry, MfsError> {
        let index = self.find_entry(name)?;
        Ok(*self.dir.entry(index))
    }

    /// Load the named subdirectory's first 16 entries into the cache.
    ///
    /// A stored cluster of 0 means the root directory (the `..` entry of a
    /// first-level subdirectory stores 0).
    pub fn change_dir(&mut self, name: &str) -> Result<(), MfsError> {
        let index = self.find_entry(name)?;
        let entry = self.dir.entry(index);
        if entry.attr() != ATTR_DIRECTORY {
            return Err(MfsError::NotADirectory(name.to_string()));
        }

        let mut cluster = entry.first_cluster();
        if cluster == 0 {
            cluster = self.geometry.root_cluster;
        }

        let offset = self.geometry.cluster_offset(cluster);
        let mut block = [0u8; DIR_BLOCK_SIZE];
        self.read_at(offset, &mut block)?;
        self.dir = DirectoryCache::from_block(&block, offset);
        debug!("cd {name}: loaded directory block at {offset:#x}");
        Ok(())
    }

    /// Stream the named file's contents into `out`.
    ///
    /// Walks the chain one sector at a time: full sectors while more than a
    /// sector remains, then the final partial sector. Exact for volumes
    /// with one sector per cluster.
    pub fn extract(&mut self, name: &str, out: &mut dyn Write) -> Result<(), MfsError> {
        let index = self.find_entry(name)?;
        let entry = *self.dir.entry(index);

        let sector = self.geometry.bytes_per_sector as u64;
        let mut remaining = entry.file_size() as u64;
        let mut cluster = entry.first_cluster();
        if cluster < 2 {
            // Nothing allocated; a zero-length file extracts as empty.
            return Ok(());
        }

        let mut buf = vec![0u8; sector as usize];
        while remaining > sector {
            let offset = self.geometry.cluster_offset(cluster);
            self.read_at(offset, &mut buf)?;
            out.write_all(&buf)?;
            remaining -= sector;
            cluster = match self.next_cluster(cluster)? {
                Some(next) => next,
                None => return Ok(()),
            };
        }
        if remaining > 0 {
            let offset = self.geometry.cluster_offset(cluster);
            self.read_at(offset, &mut buf[..remaining as usize])?;
            out.write_all(&buf[..remaining as usize])?;
        }
        Ok(())
    }

    /// Emit `length` bytes of the named file starting at byte `offset`,
    /// crossing sector boundaries along the cluster chain.
    ///
    /// The window is not clipped at the file size; it ends early only when
    /// the chain itself ends.
    pub fn read_window(
        &mut self,
        name: &str,
        offset: u64,
        length: u64,
        out: &mut dyn Write,
    ) -> Result<(), MfsError> {
        let index = self.find_entry(name)?;
        let entry = *self.dir.entry(index);

        let sector = self.geometry.bytes_per_sector as u64;
        let mut cluster = entry.first_cluster();
        let mut pos = offset;
        while pos >= sector {
            pos -= sector;
            cluster = match self.next_cluster(cluster)? {
                Some(next) => next,
                None => return Ok(()),
            };
        }
        if cluster < 2 {
            return Ok(());
        }

        let mut buf = vec![0u8; sector as usize];
        let mut remaining = length;
        while remaining > 0 {
            if pos == sector {
                cluster = match self.next_cluster(cluster)? {
                    Some(next) => next,
                    None => return Ok(()),
                };
                pos = 0;
            }
            let take = (sector - pos).min(remaining) as usize;
            let at = self.geometry.cluster_offset(cluster) + pos;
            self.read_at(at, &mut buf[..take])?;
            out.write_all(&buf[..take])?;
            pos += take as u64;
            remaining -= take as u64;
        }
        Ok(())
    }

    /// Tombstone the named entry: first name byte becomes 0xE5, then the
    /// whole cached block is flushed back where it was loaded from.
    pub fn delete(&mut self, name: &str) -> Result<(), MfsError> {
        let index = self.find_entry(name)?;
        self.dir.entry_mut(index).set_first_name_byte(ENTRY_DELETED);
        debug!("del {name}: tombstoned entry {index}");
        self.flush_directory()
    }

    /// Restore every listable entry whose open-time name matches, then
    /// flush. Fails with `NotFound` when nothing was restored.
    pub fn undelete(&mut self, name: &str) -> Result<(), MfsError> {
        let mut restored = false;
        for index in 0..DIR_ENTRIES {
            if !self.dir.entry(index).is_listable() {
                continue;
            }
            if names::matches(name, &self.original_names[index]) {
                let first = self.original_names[index][0];
                self.dir.entry_mut(index).set_first_name_byte(first);
                debug!("undel {name}: restored entry {index}");
                restored = true;
            }
        }
        if restored {
            self.flush_directory()
        } else {
            Err(MfsError::NotFound(name.to_string()))
        }
    }

    fn find_entry(&self, name: &str) -> Result<usize, MfsError> {
        self.dir
            .find(name)
            .ok_or_else(|| MfsError::NotFound(name.to_string()))
    }

    /// Read the FAT entry for `cluster`: 4 bytes little-endian, masked to
    /// 28 bits. Returns `None` at end-of-chain or on bad/reserved markers.
    fn next_cluster(&mut self, cluster: u32) -> Result<Option<u32>, MfsError> {
        let offset = self.geometry.fat_offset(cluster);
        self.device.seek(SeekFrom::Start(offset))?;
        let next = self.device.read_u32::<LittleEndian>()? & FAT_ENTRY_MASK;
        trace!("FAT[{cluster}] -> {next:#x}");
        if next >= END_OF_CHAIN {
            Ok(None)
        } else if next < 2 || next >= BAD_CLUSTER {
            Ok(None)
        } else {
            Ok(Some(next))
        }
    }

    fn flush_directory(&mut self) -> Result<(), MfsError> {
        let block = self.dir.to_block();
        let offset = self.dir.load_offset();
        self.write_at(offset, &block)?;
        debug!("flushed directory block to {offset:#x}");
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), MfsError> {
        self.device.seek(SeekFrom::Start(offset))?;
        self.device.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), MfsError> {
        self.device.seek(SeekFrom::Start(offset))?;
        self.device.write_all(buf)?;
        Ok(())
    }
}
