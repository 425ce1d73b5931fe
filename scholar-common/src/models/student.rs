//! Student roster types
//!
//! `student_id` is the external identifier ("BC No.") used as the natural
//! merge key for bulk imports. Columns with no typed counterpart land in
//! `additional_data`, which is kept apart from the typed fields so a stray
//! bag entry can never satisfy a typed-field requirement.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Transferred,
    Graduated,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Transferred => "transferred",
            StudentStatus::Graduated => "graduated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(StudentStatus::Active),
            "inactive" => Some(StudentStatus::Inactive),
            "transferred" => Some(StudentStatus::Transferred),
            "graduated" => Some(StudentStatus::Graduated),
            _ => None,
        }
    }
}

/// Typed, text-valued student fields (everything except id, status and timestamps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentField {
    StudentId,
    Name,
    DateOfBirth,
    Gender,
    Level,
    ClassName,
    Centre,
    GuardianName,
    GuardianEmail,
    GuardianPhone,
    Address,
    EmergencyContactName,
    EmergencyContactPhone,
    MedicalNotes,
    Status,
}

impl StudentField {
    pub const ALL: [StudentField; 15] = [
        StudentField::StudentId,
        StudentField::Name,
        StudentField::DateOfBirth,
        StudentField::Gender,
        StudentField::Level,
        StudentField::ClassName,
        StudentField::Centre,
        StudentField::GuardianName,
        StudentField::GuardianEmail,
        StudentField::GuardianPhone,
        StudentField::Address,
        StudentField::EmergencyContactName,
        StudentField::EmergencyContactPhone,
        StudentField::MedicalNotes,
        StudentField::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudentField::StudentId => "student_id",
            StudentField::Name => "name",
            StudentField::DateOfBirth => "date_of_birth",
            StudentField::Gender => "gender",
            StudentField::Level => "level",
            StudentField::ClassName => "class_name",
            StudentField::Centre => "centre",
            StudentField::GuardianName => "guardian_name",
            StudentField::GuardianEmail => "guardian_email",
            StudentField::GuardianPhone => "guardian_phone",
            StudentField::Address => "address",
            StudentField::EmergencyContactName => "emergency_contact_name",
            StudentField::EmergencyContactPhone => "emergency_contact_phone",
            StudentField::MedicalNotes => "medical_notes",
            StudentField::Status => "status",
        }
    }
}

/// Student fields as supplied by an import row or an API call.
///
/// `None` means "not supplied"; merges only overwrite supplied fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentInput {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub centre: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_email: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub medical_notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub additional_data: BTreeMap<String, Value>,
}

impl StudentInput {
    fn slot(&mut self, field: StudentField) -> &mut Option<String> {
        match field {
            StudentField::StudentId => &mut self.student_id,
            StudentField::Name => &mut self.name,
            StudentField::DateOfBirth => &mut self.date_of_birth,
            StudentField::Gender => &mut self.gender,
            StudentField::Level => &mut self.level,
            StudentField::ClassName => &mut self.class_name,
            StudentField::Centre => &mut self.centre,
            StudentField::GuardianName => &mut self.guardian_name,
            StudentField::GuardianEmail => &mut self.guardian_email,
            StudentField::GuardianPhone => &mut self.guardian_phone,
            StudentField::Address => &mut self.address,
            StudentField::EmergencyContactName => &mut self.emergency_contact_name,
            StudentField::EmergencyContactPhone => &mut self.emergency_contact_phone,
            StudentField::MedicalNotes => &mut self.medical_notes,
            StudentField::Status => &mut self.status,
        }
    }

    pub fn get(&self, field: StudentField) -> Option<&str> {
        let value = match field {
            StudentField::StudentId => &self.student_id,
            StudentField::Name => &self.name,
            StudentField::DateOfBirth => &self.date_of_birth,
            StudentField::Gender => &self.gender,
            StudentField::Level => &self.level,
            StudentField::ClassName => &self.class_name,
            StudentField::Centre => &self.centre,
            StudentField::GuardianName => &self.guardian_name,
            StudentField::GuardianEmail => &self.guardian_email,
            StudentField::GuardianPhone => &self.guardian_phone,
            StudentField::Address => &self.address,
            StudentField::EmergencyContactName => &self.emergency_contact_name,
            StudentField::EmergencyContactPhone => &self.emergency_contact_phone,
            StudentField::MedicalNotes => &self.medical_notes,
            StudentField::Status => &self.status,
        };
        value.as_deref()
    }

    /// Fill `field` if it is still empty. Returns false when a value was
    /// already present (first non-empty value wins).
    pub fn fill(&mut self, field: StudentField, value: &str) -> bool {
        let slot = self.slot(field);
        if slot.as_deref().map_or(false, |v| !v.trim().is_empty()) {
            return false;
        }
        *slot = Some(value.to_string());
        true
    }

    /// Trimmed external identifier, if non-empty
    pub fn external_id(&self) -> Option<&str> {
        self.student_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub student_id: String,
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub class_name: Option<String>,
    pub centre: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_email: Option<String>,
    pub guardian_phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_notes: Option<String>,
    pub status: StudentStatus,
    pub additional_data: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Build a new record from input. The caller has validated `student_id`.
    pub fn from_input(student_id: String, input: &StudentInput, now: DateTime<Utc>) -> Self {
        let mut student = Self {
            id: Uuid::new_v4(),
            student_id,
            name: None,
            date_of_birth: None,
            gender: None,
            level: None,
            class_name: None,
            centre: None,
            guardian_name: None,
            guardian_email: None,
            guardian_phone: None,
            address: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            medical_notes: None,
            status: StudentStatus::default(),
            additional_data: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        student.merge(input, now);
        student
    }

    /// Merge supplied input over this record.
    ///
    /// Non-empty input values win over stored values; fields the input does
    /// not supply keep their stored value. The additional-data bag is merged
    /// key by key with input values winning.
    pub fn merge(&mut self, input: &StudentInput, now: DateTime<Utc>) {
        fn take(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *target = Some(v.to_string());
            }
        }

        take(&mut self.name, &input.name);
        if let Some(dob) = input.date_of_birth.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            self.date_of_birth = Some(normalize_date_of_birth(dob));
        }
        take(&mut self.gender, &input.gender);
        take(&mut self.level, &input.level);
        take(&mut self.class_name, &input.class_name);
        take(&mut self.centre, &input.centre);
        take(&mut self.guardian_name, &input.guardian_name);
        take(&mut self.guardian_email, &input.guardian_email);
        take(&mut self.guardian_phone, &input.guardian_phone);
        take(&mut self.address, &input.address);
        take(&mut self.emergency_contact_name, &input.emergency_contact_name);
        take(&mut self.emergency_contact_phone, &input.emergency_contact_phone);
        take(&mut self.medical_notes, &input.medical_notes);
        if let Some(status) = input.status.as_deref().and_then(StudentStatus::parse) {
            self.status = status;
        }
        for (key, value) in &input.additional_data {
            self.additional_data.insert(key.clone(), value.clone());
        }
        self.updated_at = now;
    }
}

/// Normalise a free-text date of birth.
///
/// Recognised formats and spreadsheet date serials become `YYYY-MM-DD`;
/// anything else is kept verbatim.
pub fn normalize_date_of_birth(raw: &str) -> String {
    const FORMATS: [&str; 8] = [
        "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d", "%d %b %Y", "%d %B %Y",
        "%B %d, %Y",
    ];

    let trimmed = raw.trim();
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    // Spreadsheet serial day numbers (1900 date system), plausible birth range only
    if let Ok(serial) = trimmed.parse::<f64>() {
        if (3_000.0..80_000.0).contains(&serial) {
            if let Some(base) = NaiveDate::from_ymd_opt(1899, 12, 30) {
                if let Some(date) = base.checked_add_signed(chrono::Duration::days(serial as i64)) {
                    return date.format("%Y-%m-%d").to_string();
                }
            }
        }
    }

    trimmed.to_string()
}
