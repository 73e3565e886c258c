use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{catalog::Device, error::Result};

/// serial number -> JSON-encoded [`Device`]
const DEVICES: TableDefinition<&str, &str> = TableDefinition::new("devices");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Setting keys recorded by a fetch.
pub mod settings {
    pub const APISERVER: &str = "apiserver";
    pub const FETCHED_AT: &str = "fetched_at";
    pub const INCLUDE_INACTIVE: &str = "include_inactive";
}

/// The device table of one corpus generation.
pub struct CorpusDb {
    db: Database,
}

impl CorpusDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(DEVICES)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Devices --

    /// Insert or replace devices in a single transaction.
    pub fn put_devices(&self, devices: &[Device]) -> Result<()> {
        if devices.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DEVICES)?;
            for device in devices {
                let encoded = serde_json::to_string(device)?;
                table.insert(device.serial_number.as_str(), encoded.as_str())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Look up one device by serial number.
    pub fn get_device(&self, serial_number: &str) -> Result<Option<Device>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DEVICES)?;
        match table.get(serial_number)? {
            Some(v) => Ok(Some(serde_json::from_str(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn device_count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DEVICES)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

impl std::fmt::Debug for CorpusDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, CorpusDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = CorpusDb::open(&tmp.path().join("corpus.redb")).unwrap();
        (tmp, db)
    }

    fn with_config(hostname: &str, serial: &str, config: &str) -> Device {
        Device {
            config: Some(config.to_string()),
            ..Device::new(hostname, serial)
        }
    }

    #[test]
    fn devices_roundtrip() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_device("SN1").unwrap(), None);
        assert_eq!(db.device_count().unwrap(), 0);

        db.put_devices(&[
            with_config("spine1", "SN2", "hostname spine1"),
            with_config("leaf1", "SN1", "hostname leaf1\nvlan 10"),
        ])
        .unwrap();

        assert_eq!(db.device_count().unwrap(), 2);
        let leaf = db.get_device("SN1").unwrap().unwrap();
        assert_eq!(leaf.hostname, "leaf1");
        assert_eq!(leaf.config.as_deref(), Some("hostname leaf1\nvlan 10"));
        let spine = db.get_device("SN2").unwrap().unwrap();
        assert_eq!(spine.hostname, "spine1");
    }

    #[test]
    fn put_replaces_same_serial() {
        let (_tmp, db) = test_db();

        db.put_devices(&[with_config("old", "SN1", "a")]).unwrap();
        db.put_devices(&[with_config("new", "SN1", "b")]).unwrap();

        let device = db.get_device("SN1").unwrap().unwrap();
        assert_eq!(device.hostname, "new");
        assert_eq!(device.config.as_deref(), Some("b"));
        assert_eq!(db.device_count().unwrap(), 1);
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting(settings::APISERVER).unwrap(), None);
        assert_eq!(
            db.get_setting_or(settings::APISERVER, "unknown").unwrap(),
            "unknown"
        );

        db.set_setting(settings::APISERVER, "https://cv.example.com")
            .unwrap();
        assert_eq!(
            db.get_setting(settings::APISERVER).unwrap(),
            Some("https://cv.example.com".to_string())
        );
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("corpus.redb");

        {
            let db = CorpusDb::open(&path).unwrap();
            db.put_devices(&[with_config("leaf1", "SN1", "vlan 10")])
                .unwrap();
            db.set_setting(settings::FETCHED_AT, "1700000000").unwrap();
        }

        {
            let db = CorpusDb::open(&path).unwrap();
            assert_eq!(db.device_count().unwrap(), 1);
            assert_eq!(
                db.get_setting(settings::FETCHED_AT).unwrap(),
                Some("1700000000".to_string())
            );
        }
    }
}
