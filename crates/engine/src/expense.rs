//! The expense entity.
//!
//! An [`Expense`] is identified by an opaque 8-character id that never changes
//! once assigned. It is mutated only through [`Expense::edit`], which applies
//! a set of changes atomically and stamps `updated_at`. Deletion is a flag:
//! deleted expenses stay in the persisted and synced collection so that the
//! deletion itself reaches other clients.

use api_types::expense::{ExpenseRecord, Periodicity};
use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use rand::Rng;
use serde_json::Value;

use crate::{
    Amount, EngineError, ResultEngine,
    categories::{self, UNKNOWN_CATEGORY},
    dates,
};

const ID_LEN: usize = 8;
const ID_LEADING_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a fresh expense id: 8 characters, a letter first, then
/// letters or digits.
pub fn new_id() -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(ID_LEN);
    id.push(ID_LEADING_ALPHABET[rng.gen_range(0..ID_LEADING_ALPHABET.len())] as char);
    for _ in 1..ID_LEN {
        id.push(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char);
    }
    id
}

/// Current instant at the precision kept by the serialized form, so that a
/// persisted expense reads back equal to the in-memory one.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Partial field set used to create an expense. Unset fields get defaults.
#[derive(Clone, Debug, Default)]
pub struct ExpenseSpec {
    pub id: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Amount>,
    pub category: Option<String>,
    pub label: Option<String>,
    pub periodicity: Option<Periodicity>,
    pub deleted: Option<bool>,
    pub checked: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial field set applied by [`Expense::edit`]. The id and the update
/// timestamp are not editable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpenseChanges {
    pub date: Option<NaiveDate>,
    pub amount: Option<Amount>,
    pub category: Option<String>,
    pub label: Option<String>,
    pub periodicity: Option<Periodicity>,
    pub deleted: Option<bool>,
    pub checked: Option<bool>,
}

impl ExpenseChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expense {
    id: String,
    date: NaiveDate,
    amount: Amount,
    category: String,
    label: String,
    periodicity: Periodicity,
    deleted: bool,
    checked: bool,
    updated_at: DateTime<Utc>,
}

impl Expense {
    /// Builds an expense from a partial spec. Never fails.
    pub fn new(spec: ExpenseSpec) -> Self {
        let updated_at = spec.updated_at.unwrap_or_else(now);
        Self {
            id: spec.id.unwrap_or_else(new_id),
            date: spec.date.unwrap_or_else(dates::today),
            amount: spec.amount.unwrap_or_default(),
            category: spec
                .category
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            label: spec.label.unwrap_or_default(),
            periodicity: spec.periodicity.unwrap_or_default(),
            deleted: spec.deleted.unwrap_or(false),
            checked: spec.checked.unwrap_or(false),
            updated_at,
        }
    }

    /// Validates and coerces an untyped record (parsed JSON) into an expense.
    ///
    /// `date` and `amount` are mandatory: a missing or unparseable date, or an
    /// amount that is not a number of whole cents, is an
    /// [`EngineError::InvalidRecord`]. Every other field falls back to its
    /// default when absent or wrongly typed; a missing `updatedAt` becomes
    /// midnight of the expense date, so the same record always builds the
    /// same expense.
    pub fn from_record(record: &Value) -> ResultEngine<Self> {
        let invalid = || EngineError::InvalidRecord(record.to_string());

        let fields = record.as_object().ok_or_else(invalid)?;
        let date = fields
            .get("date")
            .and_then(Value::as_str)
            .and_then(dates::parse_day)
            .ok_or_else(invalid)?;
        let amount = fields
            .get("amount")
            .and_then(Value::as_f64)
            .and_then(Amount::from_major)
            .ok_or_else(invalid)?;

        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let flag = |key: &str| fields.get(key).and_then(Value::as_bool);

        Ok(Self::new(ExpenseSpec {
            id: text("_id").filter(|id| !id.is_empty()),
            date: Some(date),
            amount: Some(amount),
            category: text("category"),
            label: text("label"),
            periodicity: fields
                .get("periodicity")
                .and_then(Value::as_str)
                .and_then(Periodicity::parse),
            deleted: flag("deleted"),
            checked: flag("checked"),
            updated_at: Some(
                fields
                    .get("updatedAt")
                    .and_then(Value::as_str)
                    .and_then(dates::parse_instant)
                    .unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc()),
            ),
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn periodicity(&self) -> Periodicity {
        self.periodicity
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn checked(&self) -> bool {
        self.checked
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_recurring(&self) -> bool {
        self.periodicity != Periodicity::OneTime
    }

    /// Whether the category is flagged as exceptional in the catalog.
    pub fn is_exceptional(&self) -> bool {
        categories::is_exceptional(&self.category)
    }

    pub fn sign(&self) -> char {
        self.amount.sign()
    }

    /// Applies `changes` atomically and stamps `updated_at` once.
    ///
    /// An empty change set leaves the expense untouched.
    pub fn edit(&mut self, changes: ExpenseChanges) {
        if changes.is_empty() {
            return;
        }

        let ExpenseChanges {
            date,
            amount,
            category,
            label,
            periodicity,
            deleted,
            checked,
        } = changes;

        if let Some(date) = date {
            self.date = date;
        }
        if let Some(amount) = amount {
            self.amount = amount;
        }
        if let Some(category) = category {
            self.category = category;
        }
        if let Some(label) = label {
            self.label = label;
        }
        if let Some(periodicity) = periodicity {
            self.periodicity = periodicity;
        }
        if let Some(deleted) = deleted {
            self.deleted = deleted;
        }
        if let Some(checked) = checked {
            self.checked = checked;
        }
        self.updated_at = now();
    }

    /// Copies every field but the id and the update timestamp into a new
    /// expense, then applies `changes` to the copy.
    pub fn duplicate(&self, changes: ExpenseChanges) -> Expense {
        let mut copy = Expense::new(ExpenseSpec {
            date: Some(self.date),
            amount: Some(self.amount),
            category: Some(self.category.clone()),
            label: Some(self.label.clone()),
            periodicity: Some(self.periodicity),
            deleted: Some(self.deleted),
            checked: Some(self.checked),
            ..Default::default()
        });
        copy.edit(changes);
        copy
    }

    /// Canonical record for persistence and network transfer.
    pub fn to_record(&self) -> ExpenseRecord {
        ExpenseRecord {
            id: self.id.clone(),
            date: dates::format_day(self.date),
            amount: self.amount.to_major(),
            category: self.category.clone(),
            label: self.label.clone(),
            periodicity: self.periodicity,
            deleted: self.deleted,
            checked: self.checked,
            updated_at: dates::format_instant(self.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn generated_ids_follow_the_alphabet() {
        for _ in 0..200 {
            let id = new_id();
            assert_eq!(id.len(), ID_LEN);
            let mut chars = id.chars();
            assert!(chars.next().unwrap().is_ascii_alphabetic());
            assert!(chars.all(|c| c.is_ascii_alphanumeric()));
        }
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn new_fills_defaults() {
        let expense = Expense::new(ExpenseSpec::default());

        assert_eq!(expense.id().len(), ID_LEN);
        assert_eq!(expense.date(), dates::today());
        assert_eq!(expense.amount(), Amount::ZERO);
        assert_eq!(expense.category(), "unknown");
        assert_eq!(expense.label(), "");
        assert_eq!(expense.periodicity(), Periodicity::OneTime);
        assert!(!expense.deleted());
        assert!(!expense.checked());
        assert!(!expense.is_recurring());
    }

    #[test]
    fn record_without_date_is_rejected() {
        let err = Expense::from_record(&json!({ "amount": 10 })).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRecord(_)));
    }

    #[test]
    fn record_with_bad_date_or_amount_is_rejected() {
        for record in [
            json!({ "date": "not a date", "amount": 10 }),
            json!({ "date": 20240101, "amount": 10 }),
            json!({ "date": "2024-01-01", "amount": "10" }),
            json!({ "date": "2024-01-01" }),
            json!([1, 2, 3]),
        ] {
            assert!(Expense::from_record(&record).is_err(), "{record}");
        }
    }

    #[test]
    fn minimal_record_gets_defaults() {
        let expense = Expense::from_record(&json!({ "date": "2024-01-01", "amount": 10 })).unwrap();

        assert_eq!(expense.date(), day(2024, 1, 1));
        assert_eq!(expense.amount(), Amount::new(1000));
        assert_eq!(expense.category(), "unknown");
        assert_eq!(expense.label(), "");
        assert_eq!(expense.periodicity(), Periodicity::OneTime);
        assert!(!expense.deleted());
        assert!(!expense.checked());
        assert_eq!(expense.id().len(), ID_LEN);
    }

    #[test]
    fn missing_update_stamp_is_derived_from_the_date() {
        let record = json!({ "_id": "aB3dE5fG", "date": "2024-01-01", "amount": 10 });

        let first = Expense::from_record(&record).unwrap();
        let second = Expense::from_record(&record).unwrap();

        assert_eq!(
            first.updated_at(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(first, second);
    }

    #[test]
    fn record_with_sub_cent_amount_is_rejected() {
        let err = Expense::from_record(&json!({ "date": "2024-01-01", "amount": 12.345 }))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRecord(_)));
    }

    #[test]
    fn wire_amount_is_written_back_as_read() {
        for amount in [12.34, -0.1, 1.15, -99999.99] {
            let expense =
                Expense::from_record(&json!({ "date": "2024-01-01", "amount": amount })).unwrap();
            assert_eq!(expense.to_record().amount, amount);
        }
    }

    #[test]
    fn wrongly_typed_optional_fields_fall_back() {
        let expense = Expense::from_record(&json!({
            "_id": 42,
            "date": "2024-01-01",
            "amount": -3.5,
            "category": false,
            "label": ["x"],
            "periodicity": "weekly",
            "deleted": "yes",
            "checked": 1,
            "updatedAt": "later",
        }))
        .unwrap();

        assert_eq!(expense.id().len(), ID_LEN);
        assert_eq!(expense.amount(), Amount::new(-350));
        assert_eq!(expense.category(), "unknown");
        assert_eq!(expense.periodicity(), Periodicity::OneTime);
        assert!(!expense.deleted());
        assert!(!expense.checked());
    }

    #[test]
    fn record_round_trips() {
        let original = Expense::new(ExpenseSpec {
            id: Some("aB3dE5fG".to_string()),
            date: Some(day(2024, 2, 15)),
            amount: Some(Amount::new(-5000)),
            category: Some("rent".to_string()),
            label: Some("flat".to_string()),
            periodicity: Some(Periodicity::Monthly),
            deleted: Some(true),
            checked: Some(true),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 2, 15, 10, 0, 0).unwrap()),
        });

        let record = serde_json::to_value(original.to_record()).unwrap();
        assert_eq!(record["date"], "2024-02-15");
        assert_eq!(record["updatedAt"], "2024-02-15T10:00:00.000Z");
        assert_eq!(record["amount"], -50.0);

        assert_eq!(Expense::from_record(&record).unwrap(), original);
    }

    #[test]
    fn fresh_expense_round_trips() {
        let original = Expense::new(ExpenseSpec {
            amount: Some(Amount::new(-1)),
            ..Default::default()
        });
        let record = serde_json::to_value(original.to_record()).unwrap();
        assert_eq!(Expense::from_record(&record).unwrap(), original);
    }

    #[test]
    fn edit_applies_all_changes_and_stamps_once() {
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut expense = Expense::new(ExpenseSpec {
            updated_at: Some(old),
            ..Default::default()
        });
        let id = expense.id().to_string();

        expense.edit(ExpenseChanges {
            amount: Some(Amount::new(-1200)),
            category: Some("food".to_string()),
            checked: Some(true),
            ..Default::default()
        });

        assert_eq!(expense.id(), id);
        assert_eq!(expense.amount(), Amount::new(-1200));
        assert_eq!(expense.category(), "food");
        assert!(expense.checked());
        assert!(expense.updated_at() > old);
    }

    #[test]
    fn empty_edit_is_a_no_op() {
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut expense = Expense::new(ExpenseSpec {
            updated_at: Some(old),
            ..Default::default()
        });
        expense.edit(ExpenseChanges::default());
        assert_eq!(expense.updated_at(), old);
    }

    #[test]
    fn duplicate_gets_a_new_id_and_applies_changes() {
        let expense = Expense::new(ExpenseSpec {
            date: Some(day(2024, 2, 15)),
            amount: Some(Amount::new(-5000)),
            category: Some("rent".to_string()),
            periodicity: Some(Periodicity::Monthly),
            ..Default::default()
        });

        let copy = expense.duplicate(ExpenseChanges {
            date: Some(day(2024, 2, 1)),
            ..Default::default()
        });

        assert_ne!(copy.id(), expense.id());
        assert_eq!(copy.date(), day(2024, 2, 1));
        assert_eq!(copy.amount(), expense.amount());
        assert_eq!(copy.category(), "rent");
        assert!(copy.is_recurring());
    }

    #[test]
    fn sign_follows_amount() {
        let income = Expense::new(ExpenseSpec {
            amount: Some(Amount::new(1)),
            ..Default::default()
        });
        assert_eq!(income.sign(), '+');
        assert_eq!(Expense::new(ExpenseSpec::default()).sign(), '-');
    }
}
