//! Identity bank: stable `@base36` task ids.
//!
//! Keys are integers rendered as `@` + base-36. The bank persists a scan
//! counter plus a key -> owning-task-name map in `Id.txt`:
//!
//! ```text
//! @<base36 counter>
//! @<base36 key> <task name>
//! ...
//! ```
//!
//! `generate` scans forward from the counter for the first unused key and
//! wraps at `i32::MAX` back to zero, skipping keys still in use; a second
//! wrap without finding a free key reports exhaustion instead of looping.
//! Keys are released only when a task is permanently destroyed; edits and
//! renames keep the key and rebind the owner name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::task::ID_PREFIX;

/// File holding the bank, inside the vault directory.
pub const ID_FILE: &str = "Id.txt";

const MAX_KEY: i64 = i32::MAX as i64;

/// Persistent generator of stable task ids.
#[derive(Debug)]
pub struct IdBank {
    counter: i64,
    bank: BTreeMap<i64, String>,
    file_path: PathBuf,
}

impl IdBank {
    /// Open (or create) the bank file in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let file_path = dir.join(ID_FILE);
        let mut bank = Self {
            counter: 0,
            bank: BTreeMap::new(),
            file_path,
        };

        let contents = match fs::read_to_string(&bank.file_path) {
            Ok(contents) if !contents.trim().is_empty() => contents,
            Ok(_) => {
                bank.save()?;
                return Ok(bank);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                bank.save()?;
                return Ok(bank);
            }
            Err(err) => return Err(err.into()),
        };

        let mut lines = contents.lines();
        let counter_line = lines
            .next()
            .ok_or_else(|| Error::corrupt(&bank.file_path, "missing counter line"))?;
        bank.counter = parse_key(counter_line)
            .ok_or_else(|| Error::corrupt(&bank.file_path, "bad counter line"))?;

        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let (key_part, name) = line
                .split_once(' ')
                .ok_or_else(|| Error::corrupt(&bank.file_path, "bad id entry"))?;
            let key = parse_key(key_part)
                .ok_or_else(|| Error::corrupt(&bank.file_path, "bad id key"))?;
            bank.bank.insert(key, name.to_string());
        }

        Ok(bank)
    }

    /// Assign the next free key to `name` and persist.
    pub fn generate(&mut self, name: &str) -> Result<String> {
        let mut wrapped = false;
        if self.counter >= MAX_KEY {
            self.counter = 0;
            wrapped = true;
        }
        while self.bank.contains_key(&self.counter) {
            self.counter += 1;
            if self.counter >= MAX_KEY {
                if wrapped {
                    return Err(Error::IdSpaceExhausted);
                }
                self.counter = 0;
                wrapped = true;
            }
        }

        let key = self.counter;
        self.bank.insert(key, name.to_string());
        self.counter += 1;
        self.save()?;
        debug!(key, name, "generated id");
        Ok(id_string(key))
    }

    /// Release a key permanently. Unknown ids are ignored.
    pub fn release(&mut self, id: &str) -> Result<()> {
        if let Some(key) = parse_key(id) {
            if self.bank.remove(&key).is_some() {
                self.save()?;
            }
        }
        Ok(())
    }

    /// Point an existing key at a new owner name (rename/edit-replace).
    pub fn rebind(&mut self, id: &str, name: &str) -> Result<()> {
        if let Some(key) = parse_key(id) {
            self.bank.insert(key, name.to_string());
            self.save()?;
        }
        Ok(())
    }

    /// Whether the id names a live key.
    pub fn exists(&self, id: &str) -> bool {
        parse_key(id).is_some_and(|key| self.bank.contains_key(&key))
    }

    /// Current owner name of the id's key.
    pub fn owner(&self, id: &str) -> Option<&str> {
        let key = parse_key(id)?;
        self.bank.get(&key).map(String::as_str)
    }

    /// Relocate the bank file to a new directory (the caller saves).
    pub fn set_dir(&mut self, dir: &Path) {
        self.file_path = dir.join(ID_FILE);
    }

    /// Delete the backing file, leaving the in-memory bank intact.
    pub fn delete_file(&self) -> Result<()> {
        match fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Truncate and rewrite the bank file.
    pub fn save(&self) -> Result<()> {
        let mut out = String::new();
        out.push_str(&id_string(self.counter));
        out.push('\n');
        for (key, name) in &self.bank {
            out.push_str(&format!("{} {}\n", id_string(*key), name));
        }
        fs::write(&self.file_path, out)?;
        Ok(())
    }

    /// Drop every key and persist the empty bank.
    pub fn clear(&mut self) -> Result<()> {
        self.bank.clear();
        self.counter = 0;
        self.save()
    }

    #[cfg(test)]
    fn force_counter(&mut self, counter: i64) {
        self.counter = counter;
    }
}

/// Render a key as an id string.
pub fn id_string(key: i64) -> String {
    format!("{}{}", ID_PREFIX, to_base36(key))
}

/// Parse an `@base36` id back to its key.
pub fn parse_key(id: &str) -> Option<i64> {
    let digits = id.trim().strip_prefix(ID_PREFIX)?;
    if digits.is_empty() {
        return None;
    }
    i64::from_str_radix(digits, 36).ok()
}

fn to_base36(mut n: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generates_sequential_ids() {
        let temp = TempDir::new().unwrap();
        let mut bank = IdBank::open(temp.path()).unwrap();

        assert_eq!(bank.generate("a").unwrap(), "@0");
        assert_eq!(bank.generate("b").unwrap(), "@1");
        assert!(bank.exists("@0"));
        assert_eq!(bank.owner("@1"), Some("b"));
    }

    #[test]
    fn released_keys_are_not_reused_until_wrap() {
        let temp = TempDir::new().unwrap();
        let mut bank = IdBank::open(temp.path()).unwrap();

        let first = bank.generate("a").unwrap();
        bank.generate("b").unwrap();
        bank.release(&first).unwrap();

        // The counter has moved past the released key.
        assert_eq!(bank.generate("c").unwrap(), "@2");
        assert!(!bank.exists("@0"));
    }

    #[test]
    fn wraps_past_the_maximum_and_skips_live_keys() {
        let temp = TempDir::new().unwrap();
        let mut bank = IdBank::open(temp.path()).unwrap();

        let zero = bank.generate("zero").unwrap();
        bank.force_counter(MAX_KEY);

        // Key 0 is live, so the wrap lands on 1.
        assert_eq!(bank.generate("wrapped").unwrap(), "@1");
        assert!(bank.exists(&zero));
    }

    #[test]
    fn round_trips_through_the_file() {
        let temp = TempDir::new().unwrap();
        {
            let mut bank = IdBank::open(temp.path()).unwrap();
            bank.generate("alpha").unwrap();
            bank.generate("beta with spaces").unwrap();
        }

        let bank = IdBank::open(temp.path()).unwrap();
        assert_eq!(bank.owner("@0"), Some("alpha"));
        assert_eq!(bank.owner("@1"), Some("beta with spaces"));
        // Counter resumes past the persisted keys.
        let mut bank = bank;
        assert_eq!(bank.generate("gamma").unwrap(), "@2");
    }

    #[test]
    fn rebind_keeps_the_key() {
        let temp = TempDir::new().unwrap();
        let mut bank = IdBank::open(temp.path()).unwrap();

        let id = bank.generate("old name").unwrap();
        bank.rebind(&id, "new name").unwrap();

        assert_eq!(bank.owner(&id), Some("new name"));
        assert_eq!(bank.generate("next").unwrap(), "@1");
    }
}
