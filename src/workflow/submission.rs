//! Submission forms and their required-field validation.
//!
//! Every form field is optional on the wire so that validation can report all
//! missing fields at once instead of failing on the first.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::user::Role;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

pub const SALUTATIONS: &[&str] = &["Dr", "Ms", "Mr", "Mrs"];

pub const DESIGNATIONS: &[&str] = &[
    "Principal_Investigator",
    "Co_Principal_Investigator",
    "Post_Doctoral_Fellow",
    "Research Associate",
    "Senior_Research_Fellow",
    "Junior_Research_Fellow",
    "Project Associate",
    "Project Assistant",
    "Research Scholar",
    "Student Research Intern",
    "Other",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub salutation: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub contact_number: Option<String>,
    /// `YYYY-MM-DD`
    pub joining_date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScrapForm {
    pub chemical_id: Option<String>,
    /// Where the uploaded photo was stored.
    pub scrap_photo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChemicalForm {
    pub chemical_name: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Submission {
    Registration(RegistrationForm),
    Scrap { submitter_id: Uuid, form: ScrapForm },
    NewChemical { submitter_id: Uuid, form: NewChemicalForm },
}

#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub salutation: String,
    pub designation: String,
    pub department: String,
    pub contact_number: String,
    pub joining_date: NaiveDate,
}

/// Trims a field, treating blank as missing.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Collects missing or malformed field names while pulling values out of a form.
#[derive(Default)]
struct Checker {
    bad: Vec<String>,
}

impl Checker {
    fn required(&mut self, field: &str, value: &Option<String>) -> String {
        present(value).unwrap_or_else(|| {
            self.bad.push(field.to_string());
            String::new()
        })
    }

    fn check(&mut self, field: &str, ok: bool) {
        if !ok && !self.bad.iter().any(|f| f == field) {
            self.bad.push(field.to_string());
        }
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<String>> {
        if self.bad.is_empty() {
            Ok(value)
        } else {
            Err(self.bad)
        }
    }
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<ValidRegistration, Vec<String>> {
        let mut c = Checker::default();
        let name = c.required("name", &self.name);
        let email = c.required("email", &self.email).to_lowercase();
        let password = c.required("password", &self.password);
        let salutation = c.required("salutation", &self.salutation);
        let designation = c.required("designation", &self.designation);
        let department = c.required("department", &self.department);
        let contact_number = c.required("contactNumber", &self.contact_number);
        let joining_raw = c.required("joiningDate", &self.joining_date);

        if !email.is_empty() {
            c.check("email", EMAIL_RE.is_match(&email));
        }
        if !salutation.is_empty() {
            c.check("salutation", SALUTATIONS.contains(&salutation.as_str()));
        }
        if !designation.is_empty() {
            c.check("designation", DESIGNATIONS.contains(&designation.as_str()));
        }
        let joining_date = NaiveDate::parse_from_str(&joining_raw, "%Y-%m-%d").ok();
        if !joining_raw.is_empty() {
            c.check("joiningDate", joining_date.is_some());
        }

        let joining_date = joining_date.unwrap_or_default();
        c.finish(ValidRegistration {
            name,
            email,
            password,
            role: self.role.unwrap_or(Role::User),
            salutation,
            designation,
            department,
            contact_number,
            joining_date,
        })
    }
}

impl ScrapForm {
    /// Returns `(chemical_id, photo_path)`.
    pub fn validate(&self) -> Result<(String, String), Vec<String>> {
        let mut c = Checker::default();
        let chemical_id = c.required("chemicalId", &self.chemical_id);
        let photo = c.required("scrapPhoto", &self.scrap_photo);
        c.finish((chemical_id, photo))
    }
}

impl NewChemicalForm {
    pub fn validate(&self) -> Result<String, Vec<String>> {
        let mut c = Checker::default();
        let name = c.required("chemicalName", &self.chemical_name);
        c.finish(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> RegistrationForm {
        RegistrationForm {
            name: Some("Asha Rao".into()),
            email: Some("Asha@Lab.org".into()),
            password: Some("s3cret!".into()),
            role: None,
            salutation: Some("Dr".into()),
            designation: Some("Research Scholar".into()),
            department: Some("Chemistry".into()),
            contact_number: Some("9876543210".into()),
            joining_date: Some("2024-02-01".into()),
        }
    }

    #[test]
    fn test_valid_registration_normalises_email() {
        let valid = full_form().validate().unwrap();
        assert_eq!(valid.email, "asha@lab.org");
        assert_eq!(valid.role, Role::User);
        assert_eq!(valid.joining_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_all_missing_fields_are_reported() {
        let missing = RegistrationForm::default().validate().unwrap_err();
        assert_eq!(
            missing,
            vec![
                "name",
                "email",
                "password",
                "salutation",
                "designation",
                "department",
                "contactNumber",
                "joiningDate"
            ]
        );
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let mut form = full_form();
        form.email = Some("not-an-email".into());
        form.salutation = Some("Prof".into());
        form.joining_date = Some("01/02/2024".into());
        let bad = form.validate().unwrap_err();
        assert_eq!(bad, vec!["email", "salutation", "joiningDate"]);
    }

    #[test]
    fn test_blank_is_missing() {
        let form = NewChemicalForm {
            chemical_name: Some("   ".into()),
        };
        assert_eq!(form.validate().unwrap_err(), vec!["chemicalName"]);
    }

    #[test]
    fn test_scrap_needs_photo() {
        let form = ScrapForm {
            chemical_id: Some("CHEM-001".into()),
            scrap_photo: None,
        };
        assert_eq!(form.validate().unwrap_err(), vec!["scrapPhoto"]);
    }
}
