//! Field rules for manually entered and uploaded customer rows.
//!
//! Every rule is checked independently so a user sees all problems with an
//! entry at once instead of fixing them one round-trip at a time.

use crate::errors::{AppError, FieldError};
use crate::models::{CustomerRecord, Gender, Geography, ManualEntry, MISSING_SURNAME};
use std::ops::RangeInclusive;

pub const AGE_RANGE: RangeInclusive<i64> = 18..=100;
pub const PRODUCTS_RANGE: RangeInclusive<i64> = 0..=10;
/// Tenure in years. The wizard's slider bound is the canonical one.
pub const TENURE_RANGE: RangeInclusive<i64> = 0..=50;

/// Validates a manual-entry form and builds the record it describes.
///
/// # Returns
///
/// * `Ok(CustomerRecord)` with yes/no mapped to flags and a defaulted surname.
/// * `Err(AppError::Validation)` carrying one message per violated rule.
pub fn validate_manual_entry(entry: &ManualEntry) -> Result<CustomerRecord, AppError> {
    let mut errors = Vec::new();

    let gender = match entry.gender.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push(FieldError::new("Gender", "Gender is required"));
            None
        }
        Some(raw) => match raw.parse::<Gender>() {
            Ok(g) => Some(g),
            Err(()) => {
                errors.push(FieldError::new(
                    "Gender",
                    format!("Gender must be one of Male, Female (got '{}')", raw),
                ));
                None
            }
        },
    };

    let geography = match entry.geography.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push(FieldError::new("Geography", "Geography is required"));
            None
        }
        Some(raw) => match raw.parse::<Geography>() {
            Ok(g) => Some(g),
            Err(()) => {
                errors.push(FieldError::new(
                    "Geography",
                    format!(
                        "Geography must be one of France, Spain, Germany (got '{}')",
                        raw
                    ),
                ));
                None
            }
        },
    };

    let age = bounded_integer(entry.age, "Age", "Age", AGE_RANGE, &mut errors);

    let credit_score = match entry.credit_score {
        Some(score) if score.is_finite() && score > 0.0 => Some(score),
        Some(_) => {
            errors.push(FieldError::new(
                "CreditScore",
                "Credit Score must be greater than 0",
            ));
            None
        }
        None => {
            errors.push(FieldError::new("CreditScore", "Credit Score is required"));
            None
        }
    };

    let tenure = bounded_integer(entry.tenure, "Tenure", "Tenure", TENURE_RANGE, &mut errors);
    let balance = finite_amount(entry.balance, "Balance", "Balance", &mut errors);
    let estimated_salary = finite_amount(
        entry.estimated_salary,
        "EstimatedSalary",
        "Estimated Salary",
        &mut errors,
    );
    let num_of_products = bounded_integer(
        entry.num_of_products,
        "NumOfProducts",
        "Number of Products",
        PRODUCTS_RANGE,
        &mut errors,
    );

    let is_active_member = yes_no(
        entry.is_active_member.as_deref(),
        "IsActiveMember",
        "Active Member",
        &mut errors,
    );
    let has_credit_card = yes_no(
        entry.has_credit_card.as_deref(),
        "HasCrCard",
        "Credit Card",
        &mut errors,
    );

    match (
        gender,
        geography,
        age,
        credit_score,
        tenure,
        balance,
        estimated_salary,
        num_of_products,
        is_active_member,
        has_credit_card,
    ) {
        (
            Some(gender),
            Some(geography),
            Some(age),
            Some(credit_score),
            Some(tenure),
            Some(balance),
            Some(estimated_salary),
            Some(num_of_products),
            Some(is_active_member),
            Some(has_credit_card),
        ) if errors.is_empty() => Ok(CustomerRecord {
            surname: entry
                .surname
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(MISSING_SURNAME)
                .to_string(),
            gender,
            geography,
            age,
            is_active_member,
            has_credit_card,
            num_of_products,
            tenure,
            balance,
            estimated_salary,
            credit_score,
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

/// Checks a decoded record against the same domains applied to manual entry.
///
/// Presence and enum membership are already guaranteed by decoding, so only
/// range rules can fail here.
pub fn validate_record(record: &CustomerRecord) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if !AGE_RANGE.contains(&i64::from(record.age)) {
        errors.push(out_of_range("Age", "Age", &AGE_RANGE));
    }
    if !TENURE_RANGE.contains(&i64::from(record.tenure)) {
        errors.push(out_of_range("Tenure", "Tenure", &TENURE_RANGE));
    }
    if !PRODUCTS_RANGE.contains(&i64::from(record.num_of_products)) {
        errors.push(out_of_range(
            "NumOfProducts",
            "Number of Products",
            &PRODUCTS_RANGE,
        ));
    }
    if !(record.credit_score.is_finite() && record.credit_score > 0.0) {
        errors.push(FieldError::new(
            "CreditScore",
            "Credit Score must be greater than 0",
        ));
    }
    if !record.balance.is_finite() {
        errors.push(FieldError::new("Balance", "Balance must be a number"));
    }
    if !record.estimated_salary.is_finite() {
        errors.push(FieldError::new(
            "EstimatedSalary",
            "Estimated Salary must be a number",
        ));
    }

    errors
}

/// Validates every uploaded row, prefixing messages with the 1-based row number.
pub fn validate_batch(records: &[CustomerRecord]) -> Result<(), AppError> {
    let errors: Vec<FieldError> = records
        .iter()
        .enumerate()
        .flat_map(|(idx, record)| {
            validate_record(record).into_iter().map(move |e| FieldError {
                field: e.field,
                message: format!("Row {}: {}", idx + 1, e.message),
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn bounded_integer(
    value: Option<i64>,
    field: &str,
    label: &str,
    range: RangeInclusive<i64>,
    errors: &mut Vec<FieldError>,
) -> Option<u32> {
    match value {
        None => {
            errors.push(FieldError::new(field, format!("{} is required", label)));
            None
        }
        Some(v) if range.contains(&v) => u32::try_from(v).ok(),
        Some(_) => {
            errors.push(out_of_range(field, label, &range));
            None
        }
    }
}

fn finite_amount(
    value: Option<f64>,
    field: &str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v),
        Some(_) => {
            errors.push(FieldError::new(field, format!("{} must be a number", label)));
            None
        }
        None => {
            errors.push(FieldError::new(field, format!("{} is required", label)));
            None
        }
    }
}

fn yes_no(
    value: Option<&str>,
    field: &str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Option<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("yes") => Some(true),
        Some("no") => Some(false),
        _ => {
            errors.push(FieldError::new(
                field,
                format!("{} must be either 'yes' or 'no'", label),
            ));
            None
        }
    }
}

fn out_of_range(field: &str, label: &str, range: &RangeInclusive<i64>) -> FieldError {
    FieldError::new(
        field,
        format!(
            "{} must be between {} and {}",
            label,
            range.start(),
            range.end()
        ),
    )
}
