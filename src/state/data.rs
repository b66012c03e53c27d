/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the database layer, the photo catalog and the UI layer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Editable fields of an address record, in form order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    Province,
    City,
    Street,
    Remark,
    Phone,
    Wechat,
    Qq,
    Price,
    Project,
    PhotoPath,
    Age,
    DurationHours,
    Height,
    Weight,
}

impl AddressField {
    /// Every field in the order the form shows them
    pub const ALL: [AddressField; 14] = [
        AddressField::Province,
        AddressField::City,
        AddressField::Street,
        AddressField::Remark,
        AddressField::Phone,
        AddressField::Wechat,
        AddressField::Qq,
        AddressField::Price,
        AddressField::Project,
        AddressField::PhotoPath,
        AddressField::Age,
        AddressField::DurationHours,
        AddressField::Height,
        AddressField::Weight,
    ];

    /// Human readable label for forms and detail views
    pub fn label(self) -> &'static str {
        match self {
            AddressField::Province => "Province",
            AddressField::City => "City",
            AddressField::Street => "Street",
            AddressField::Remark => "Remark",
            AddressField::Phone => "Phone",
            AddressField::Wechat => "WeChat",
            AddressField::Qq => "QQ",
            AddressField::Price => "Price",
            AddressField::Project => "Project",
            AddressField::PhotoPath => "Photo",
            AddressField::Age => "Age",
            AddressField::DurationHours => "Duration (hours)",
            AddressField::Height => "Height",
            AddressField::Weight => "Weight",
        }
    }
}

/// Form values for creating or updating an address record.
///
/// Everything is free text; the store trims values before writing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFields {
    pub province: String,
    pub city: String,
    pub street: String,
    pub remark: String,
    pub phone: String,
    pub wechat: String,
    pub qq: String,
    pub price: String,
    pub project: String,
    pub photo_path: String,
    pub age: String,
    pub duration_hours: String,
    pub height: String,
    pub weight: String,
}

impl AddressFields {
    /// Read a single field by key
    pub fn get(&self, field: AddressField) -> &str {
        match field {
            AddressField::Province => &self.province,
            AddressField::City => &self.city,
            AddressField::Street => &self.street,
            AddressField::Remark => &self.remark,
            AddressField::Phone => &self.phone,
            AddressField::Wechat => &self.wechat,
            AddressField::Qq => &self.qq,
            AddressField::Price => &self.price,
            AddressField::Project => &self.project,
            AddressField::PhotoPath => &self.photo_path,
            AddressField::Age => &self.age,
            AddressField::DurationHours => &self.duration_hours,
            AddressField::Height => &self.height,
            AddressField::Weight => &self.weight,
        }
    }

    /// Mutable access to a single field by key (used by form inputs)
    pub fn get_mut(&mut self, field: AddressField) -> &mut String {
        match field {
            AddressField::Province => &mut self.province,
            AddressField::City => &mut self.city,
            AddressField::Street => &mut self.street,
            AddressField::Remark => &mut self.remark,
            AddressField::Phone => &mut self.phone,
            AddressField::Wechat => &mut self.wechat,
            AddressField::Qq => &mut self.qq,
            AddressField::Price => &mut self.price,
            AddressField::Project => &mut self.project,
            AddressField::PhotoPath => &mut self.photo_path,
            AddressField::Age => &mut self.age,
            AddressField::DurationHours => &mut self.duration_hours,
            AddressField::Height => &mut self.height,
            AddressField::Weight => &mut self.weight,
        }
    }

    /// Copy with every value trimmed
    pub fn trimmed(&self) -> Self {
        let mut out = Self::default();
        for field in AddressField::ALL {
            *out.get_mut(field) = self.get(field).trim().to_string();
        }
        out
    }

    /// Province, city and street concatenated without separators
    pub fn full_address(&self) -> String {
        format!("{}{}{}", self.province, self.city, self.street)
    }
}

/// Represents a single address record in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Unique database ID
    pub id: i64,
    /// Derived from province + city + street on every write
    pub full_address: String,
    pub fields: AddressFields,
}

impl AddressRecord {
    /// One-line listing text, e.g. `Zhejiang-Hangzhou-West Lake Rd 1 (phone: 123)`.
    /// Blank fields are left out.
    pub fn summary(&self) -> String {
        let f = &self.fields;
        let mut line = format!("{}-{}-{}", f.province, f.city, f.street);

        let extras = [
            ("remark", f.remark.as_str()),
            ("phone", f.phone.as_str()),
            ("wechat", f.wechat.as_str()),
            ("qq", f.qq.as_str()),
            ("price", f.price.as_str()),
            ("project", f.project.as_str()),
        ];
        for (label, value) in extras {
            if !value.is_empty() {
                line.push_str(&format!(" ({}: {})", label, value));
            }
        }

        if !f.photo_path.is_empty() {
            line.push_str(&format!(" (photo: {})", file_name_of(&f.photo_path)));
        }
        if !f.age.is_empty() {
            line.push_str(&format!(" (age: {})", f.age));
        }
        if !f.duration_hours.is_empty() {
            line.push_str(&format!(" (duration: {}h)", f.duration_hours));
        }
        if !f.height.is_empty() {
            line.push_str(&format!(" (height: {})", f.height));
        }
        if !f.weight.is_empty() {
            line.push_str(&format!(" (weight: {})", f.weight));
        }

        line
    }
}

/// One photo in the published catalog (`data.json`).
///
/// Keys match the JSON consumed by the static listing page. Missing keys
/// read as empty strings and numbers or booleans as their text, so older or
/// hand-edited files still load. Any other key is kept in `extra` and
/// written back unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogEntry {
    /// Path relative to the project root, e.g. `images/a.jpg`
    #[serde(deserialize_with = "lenient_string")]
    pub photo_path: String,
    #[serde(deserialize_with = "lenient_string")]
    pub full_address: String,
    #[serde(deserialize_with = "lenient_string")]
    pub age: String,
    #[serde(deserialize_with = "lenient_string")]
    pub price: String,
    #[serde(deserialize_with = "lenient_string")]
    pub height: String,
    #[serde(deserialize_with = "lenient_string")]
    pub weight: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogEntry {
    /// File name component of `photo_path`
    pub fn file_name(&self) -> &str {
        file_name_of(&self.photo_path)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// Metadata typed into the photo form, before the photo has a catalog path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoDetails {
    pub full_address: String,
    pub age: String,
    pub price: String,
    pub height: String,
    pub weight: String,
}

/// Last path component of a `/` or `\` separated path string
pub fn file_name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(pos) => &trimmed[pos + 1..],
        None => Path::new(trimmed)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(trimmed),
    }
}
