use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::data::{file_name_of, AddressFields, AddressRecord, CatalogEntry};

/// Column list shared by every SELECT that builds an `AddressRecord`
const RECORD_COLUMNS: &str = "id, province, city, street, full_address, remark, phone, wechat, qq, \
     price, project, photo_path, age, duration_hours, height, weight";

/// Text columns scanned by keyword search
const SEARCH_COLUMNS: [&str; 15] = [
    "province",
    "city",
    "street",
    "full_address",
    "remark",
    "phone",
    "wechat",
    "qq",
    "price",
    "project",
    "photo_path",
    "age",
    "duration_hours",
    "height",
    "weight",
];

/// Administrative suffixes a keyword may omit when naming a province
const PROVINCE_SUFFIXES: [char; 2] = ['省', '市'];

/// Input rejected before touching the database
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("province, city and street are all required")]
    MissingRequired,
    #[error("a record with the same phone, WeChat and QQ already exists")]
    DuplicateContact,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no address record with id {0}")]
    NotFound(i64),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot prepare database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The RecordStore manages the SQLite address table.
/// Every call commits immediately; there are no multi-statement transactions.
pub struct RecordStore {
    conn: Connection,
    db_path: PathBuf,
}

impl RecordStore {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        info!("Address database opened at {}", path.display());

        let store = RecordStore {
            conn,
            db_path: path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an existing database without creating or altering anything.
    /// Used to read address books produced by older installs.
    pub fn open_read_only(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(RecordStore {
            conn,
            db_path: path.to_path_buf(),
        })
    }

    /// Private in-memory store for tests
    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let store = RecordStore {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create the addresses table and its indexes if they don't exist.
    fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS addresses (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                province        TEXT NOT NULL,
                city            TEXT NOT NULL,
                street          TEXT,
                full_address    TEXT NOT NULL,
                remark          TEXT,
                phone           TEXT,
                wechat          TEXT,
                qq              TEXT,
                price           TEXT,
                project         TEXT,
                photo_path      TEXT,
                age             TEXT,
                duration_hours  TEXT,
                height          TEXT,
                weight          TEXT
            )",
            [],
        )?;

        // Region drop-downs and queries
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_addresses_region
             ON addresses(province, city)",
            [],
        )?;

        // Duplicate contact check on insert
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_addresses_contact
             ON addresses(phone, wechat, qq)",
            [],
        )?;

        debug!("Address schema ready");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Number of records in the store
    pub fn count(&self) -> StoreResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM addresses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a new record and return its id.
    ///
    /// Fails with `MissingRequired` if province, city or street is blank and
    /// with `DuplicateContact` if another record has the same contact triple.
    pub fn create(&self, fields: &AddressFields) -> StoreResult<i64> {
        let fields = validate(fields)?;

        if self.contact_taken(&fields, None)? {
            return Err(ValidationError::DuplicateContact.into());
        }

        self.conn.execute(
            "INSERT INTO addresses (province, city, street, full_address, remark, phone, wechat, qq,
                                    price, project, photo_path, age, duration_hours, height, weight)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                fields.province,
                fields.city,
                fields.street,
                fields.full_address(),
                fields.remark,
                fields.phone,
                fields.wechat,
                fields.qq,
                fields.price,
                fields.project,
                fields.photo_path,
                fields.age,
                fields.duration_hours,
                fields.height,
                fields.weight,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        info!("Added address {} ({})", id, fields.full_address());
        Ok(id)
    }

    /// Overwrite every field of an existing record.
    pub fn update(&self, id: i64, fields: &AddressFields) -> StoreResult<()> {
        let fields = validate(fields)?;

        if self.contact_taken(&fields, Some(id))? {
            return Err(ValidationError::DuplicateContact.into());
        }

        let changed = self.conn.execute(
            "UPDATE addresses SET province = ?1, city = ?2, street = ?3, full_address = ?4,
                    remark = ?5, phone = ?6, wechat = ?7, qq = ?8, price = ?9, project = ?10,
                    photo_path = ?11, age = ?12, duration_hours = ?13, height = ?14, weight = ?15
             WHERE id = ?16",
            params![
                fields.province,
                fields.city,
                fields.street,
                fields.full_address(),
                fields.remark,
                fields.phone,
                fields.wechat,
                fields.qq,
                fields.price,
                fields.project,
                fields.photo_path,
                fields.age,
                fields.duration_hours,
                fields.height,
                fields.weight,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        info!("Updated address {}", id);
        Ok(())
    }

    /// Delete a batch of records, returning how many rows went away.
    pub fn delete(&self, ids: &[i64]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let removed = self.conn.execute(
            &format!("DELETE FROM addresses WHERE id IN ({})", placeholders),
            params_from_iter(ids.iter()),
        )?;

        info!("Deleted {} address records", removed);
        Ok(removed)
    }

    /// Fetch a single record by id
    pub fn get(&self, id: i64) -> StoreResult<Option<AddressRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM addresses WHERE id = ?1",
            RECORD_COLUMNS
        ))?;

        let mut rows = stmt.query_map([id], record_from_row)?;
        match rows.next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    /// All records in exactly this province and city
    pub fn find_by_region(&self, province: &str, city: &str) -> StoreResult<Vec<AddressRecord>> {
        self.query_records(
            &format!(
                "SELECT {} FROM addresses WHERE province = ?1 AND city = ?2 ORDER BY id",
                RECORD_COLUMNS
            ),
            &[province, city],
        )
    }

    /// Free-text search.
    ///
    /// A keyword naming a known province (optionally without its trailing
    /// `省`/`市`) returns that whole province; anything else is a substring
    /// match over every text column. A blank keyword matches nothing.
    pub fn search(&self, keyword: &str) -> StoreResult<Vec<AddressRecord>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(province) = self.province_named(keyword)? {
            debug!("Keyword {:?} matched province {:?}", keyword, province);
            return self.query_records(
                &format!(
                    "SELECT {} FROM addresses WHERE province = ?1 ORDER BY id",
                    RECORD_COLUMNS
                ),
                &[province.as_str()],
            );
        }

        let predicate = SEARCH_COLUMNS
            .iter()
            .map(|column| format!("{} LIKE ?1", column))
            .collect::<Vec<_>>()
            .join(" OR ");
        let pattern = format!("%{}%", keyword);

        self.query_records(
            &format!(
                "SELECT {} FROM addresses WHERE {} ORDER BY id",
                RECORD_COLUMNS, predicate
            ),
            &[pattern.as_str()],
        )
    }

    /// Distinct provinces, sorted
    pub fn provinces(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT province FROM addresses ORDER BY province")?;
        let provinces = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(provinces)
    }

    /// Distinct cities of one province, sorted
    pub fn cities(&self, province: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT city FROM addresses WHERE province = ?1 ORDER BY city",
        )?;
        let cities = stmt
            .query_map([province], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(cities)
    }

    /// Records that carry a photo, projected into catalog entries.
    ///
    /// The photo lands under `images/<file name>`; blank attributes become `N/A`.
    pub fn catalog_candidates(&self) -> StoreResult<Vec<CatalogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT photo_path, full_address, age, price, height, weight
             FROM addresses
             WHERE photo_path IS NOT NULL AND photo_path != ''
             ORDER BY id",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let photo_path: String = row.get(0)?;
                let or_na = |idx: usize| -> rusqlite::Result<String> {
                    let value: Option<String> = row.get(idx)?;
                    Ok(value
                        .filter(|v| !v.trim().is_empty())
                        .unwrap_or_else(|| "N/A".to_string()))
                };

                Ok(CatalogEntry {
                    photo_path: format!("images/{}", file_name_of(&photo_path)),
                    full_address: or_na(1)?,
                    age: or_na(2)?,
                    price: or_na(3)?,
                    height: or_na(4)?,
                    weight: or_na(5)?,
                    ..Default::default()
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn province_named(&self, keyword: &str) -> StoreResult<Option<String>> {
        let provinces = self.provinces()?;
        Ok(provinces.into_iter().find(|province| {
            province == keyword
                || PROVINCE_SUFFIXES.iter().any(|suffix| {
                    province
                        .strip_suffix(*suffix)
                        .is_some_and(|stem| stem == keyword)
                })
        }))
    }

    fn contact_taken(&self, fields: &AddressFields, except: Option<i64>) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM addresses
             WHERE phone = ?1 AND wechat = ?2 AND qq = ?3 AND id != ?4",
            params![fields.phone, fields.wechat, fields.qq, except.unwrap_or(-1)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn query_records(&self, sql: &str, args: &[&str]) -> StoreResult<Vec<AddressRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params_from_iter(args.iter()), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Trim the form and enforce the required address triple
fn validate(fields: &AddressFields) -> Result<AddressFields, ValidationError> {
    let fields = fields.trimmed();
    if fields.province.is_empty() || fields.city.is_empty() || fields.street.is_empty() {
        return Err(ValidationError::MissingRequired);
    }
    Ok(fields)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AddressRecord> {
    // Older databases may hold NULL in optional columns
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };

    Ok(AddressRecord {
        id: row.get(0)?,
        full_address: text(4)?,
        fields: AddressFields {
            province: text(1)?,
            city: text(2)?,
            street: text(3)?,
            remark: text(5)?,
            phone: text(6)?,
            wechat: text(7)?,
            qq: text(8)?,
            price: text(9)?,
            project: text(10)?,
            photo_path: text(11)?,
            age: text(12)?,
            duration_hours: text(13)?,
            height: text(14)?,
            weight: text(15)?,
        },
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(province: &str, city: &str, street: &str, phone: &str) -> AddressFields {
        AddressFields {
            province: province.into(),
            city: city.into(),
            street: street.into(),
            phone: phone.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_then_find_by_region() {
        let store = RecordStore::open_in_memory().unwrap();
        let id = store
            .create(&address("浙江省", "杭州市", "西湖路1号", "111"))
            .unwrap();
        store
            .create(&address("浙江省", "宁波市", "中山路2号", "222"))
            .unwrap();

        let found = store.find_by_region("浙江省", "杭州市").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].full_address, "浙江省杭州市西湖路1号");
        assert_eq!(found[0].fields.phone, "111");
    }

    #[test]
    fn test_create_trims_values() {
        let store = RecordStore::open_in_memory().unwrap();
        let id = store
            .create(&address("  Zhejiang ", "Hangzhou", " Lake Rd ", " 1 "))
            .unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.fields.province, "Zhejiang");
        assert_eq!(record.fields.phone, "1");
        assert_eq!(record.full_address, "ZhejiangHangzhouLake Rd");
    }

    #[test]
    fn test_create_requires_address_triple() {
        let store = RecordStore::open_in_memory().unwrap();
        let err = store.create(&address("Zhejiang", "  ", "Lake Rd", "1")).unwrap_err();

        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::MissingRequired)
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_contact_is_rejected() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut first = address("A", "B", "C", "555");
        first.wechat = "wx".into();
        first.qq = "9".into();
        store.create(&first).unwrap();

        let mut second = address("X", "Y", "Z", "555");
        second.wechat = "wx".into();
        second.qq = "9".into();
        let err = store.create(&second).unwrap_err();

        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::DuplicateContact)
        ));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_blank_contacts_collide() {
        let store = RecordStore::open_in_memory().unwrap();
        store.create(&address("A", "B", "C", "")).unwrap();

        let err = store.create(&address("D", "E", "F", "")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::DuplicateContact)
        ));
    }

    #[test]
    fn test_delete_removes_exactly_the_batch() {
        let store = RecordStore::open_in_memory().unwrap();
        let a = store.create(&address("A", "B", "C", "1")).unwrap();
        let b = store.create(&address("A", "B", "D", "2")).unwrap();
        let c = store.create(&address("A", "B", "E", "3")).unwrap();

        assert_eq!(store.delete(&[a, c]).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get(a).unwrap().is_none());
        assert!(store.get(b).unwrap().is_some());
        assert_eq!(store.delete(&[]).unwrap(), 0);
    }

    #[test]
    fn test_update_unknown_id_fails() {
        let store = RecordStore::open_in_memory().unwrap();
        let err = store.update(42, &address("A", "B", "C", "1")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[test]
    fn test_update_rewrites_fields_and_full_address() {
        let store = RecordStore::open_in_memory().unwrap();
        let id = store.create(&address("A", "B", "C", "1")).unwrap();

        let mut changed = address("A", "B2", "C2", "1");
        changed.remark = "moved".into();
        store.update(id, &changed).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.full_address, "AB2C2");
        assert_eq!(record.fields.remark, "moved");
    }

    #[test]
    fn test_update_keeps_own_contact_but_rejects_others() {
        let store = RecordStore::open_in_memory().unwrap();
        let a = store.create(&address("A", "B", "C", "1")).unwrap();
        store.create(&address("A", "B", "D", "2")).unwrap();

        store.update(a, &address("A", "B", "C-new", "1")).unwrap();
        let err = store.update(a, &address("A", "B", "C", "2")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::DuplicateContact)
        ));
    }

    #[test]
    fn test_search_by_province_name_with_or_without_suffix() {
        let store = RecordStore::open_in_memory().unwrap();
        store.create(&address("浙江省", "杭州市", "西湖路", "1")).unwrap();
        store.create(&address("北京市", "朝阳区", "建国路", "2")).unwrap();
        store.create(&address("江苏省", "南京市", "浙江路", "3")).unwrap();

        let zhejiang = store.search("浙江").unwrap();
        assert_eq!(zhejiang.len(), 1);
        assert_eq!(zhejiang[0].fields.province, "浙江省");

        let beijing = store.search("北京").unwrap();
        assert_eq!(beijing.len(), 1);
        assert_eq!(store.search("北京市").unwrap().len(), 1);
    }

    #[test]
    fn test_search_substring_across_columns() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut with_remark = address("A", "B", "C", "1");
        with_remark.remark = "corner shop".into();
        store.create(&with_remark).unwrap();
        store.create(&address("A", "B", "D", "2")).unwrap();

        let hits = store.search("shop").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.remark, "corner shop");

        assert!(store.search("   ").unwrap().is_empty());
        assert_eq!(store.search("AB").unwrap().len(), 2);
    }

    #[test]
    fn test_provinces_and_cities_are_distinct_and_sorted() {
        let store = RecordStore::open_in_memory().unwrap();
        store.create(&address("Z", "b", "1", "1")).unwrap();
        store.create(&address("Z", "a", "2", "2")).unwrap();
        store.create(&address("Z", "a", "3", "3")).unwrap();
        store.create(&address("M", "c", "4", "4")).unwrap();

        assert_eq!(store.provinces().unwrap(), vec!["M", "Z"]);
        assert_eq!(store.cities("Z").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_catalog_candidates_project_photo_records() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut with_photo = address("A", "B", "C", "1");
        with_photo.photo_path = "/home/me/pics/p1.jpg".into();
        with_photo.age = "25".into();
        store.create(&with_photo).unwrap();
        store.create(&address("A", "B", "D", "2")).unwrap();

        let entries = store.catalog_candidates().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].photo_path, "images/p1.jpg");
        assert_eq!(entries[0].full_address, "ABC");
        assert_eq!(entries[0].age, "25");
        assert_eq!(entries[0].price, "N/A");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("addresses.db");

        let store = RecordStore::open(&path).unwrap();
        store.create(&address("A", "B", "C", "1")).unwrap();
        drop(store);

        let reopened = RecordStore::open_read_only(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
