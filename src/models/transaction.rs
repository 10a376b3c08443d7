use log::debug;
use serde::{ Deserialize, Deserializer, Serialize, Serializer };
use std::fmt;

/// Kind of financial event. Labels outside the known set are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    Expense,
    Income,
    LoanGive,
    LoanReceive,
    Investment,
    Saving,
    Bill,
    Other(String),
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionType::Expense => "expense",
            TransactionType::Income => "income",
            TransactionType::LoanGive => "loan_give",
            TransactionType::LoanReceive => "loan_receive",
            TransactionType::Investment => "investment",
            TransactionType::Saving => "saving",
            TransactionType::Bill => "bill",
            TransactionType::Other(label) => label,
        }
    }
}

impl From<String> for TransactionType {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "expense" => TransactionType::Expense,
            "income" => TransactionType::Income,
            "loan_give" => TransactionType::LoanGive,
            "loan_receive" => TransactionType::LoanReceive,
            "investment" => TransactionType::Investment,
            "saving" => TransactionType::Saving,
            "bill" => TransactionType::Bill,
            _ => TransactionType::Other(label),
        }
    }
}

impl From<TransactionType> for String {
    fn from(kind: TransactionType) -> Self {
        match kind {
            TransactionType::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spending category assigned by the model. Known labels are matched
/// case-insensitively in Vietnamese or English; anything else is `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    FoodAndDrink,
    Shopping,
    Entertainment,
    Transport,
    Salary,
    Lending,
    Borrowing,
    Investment,
    Saving,
    Bills,
    Other(String),
}

impl Category {
    pub fn label(&self) -> &str {
        match self {
            Category::FoodAndDrink => "Ăn uống",
            Category::Shopping => "Mua sắm",
            Category::Entertainment => "Giải trí",
            Category::Transport => "Đi lại",
            Category::Salary => "Lương",
            Category::Lending => "Cho vay",
            Category::Borrowing => "Đi vay",
            Category::Investment => "Đầu tư",
            Category::Saving => "Tiết kiệm",
            Category::Bills => "Hóa đơn",
            Category::Other(label) => label,
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other("Khác".to_string())
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "ăn uống" | "food" | "food & drink" | "eating" => Category::FoodAndDrink,
            "mua sắm" | "shopping" => Category::Shopping,
            "giải trí" | "entertainment" => Category::Entertainment,
            "đi lại" | "di chuyển" | "transport" => Category::Transport,
            "lương" | "salary" => Category::Salary,
            "cho vay" | "lending" => Category::Lending,
            "đi vay" | "vay" | "borrowing" => Category::Borrowing,
            "đầu tư" | "investment" => Category::Investment,
            "tiết kiệm" | "saving" | "savings" => Category::Saving,
            "hóa đơn" | "hoá đơn" | "bills" | "bill" => Category::Bills,
            _ => Category::Other(label),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Whole currency units (VND has no minor unit).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(pub u64);

impl Amount {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Whole(u64),
    Fractional(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        match RawAmount::deserialize(deserializer)? {
            RawAmount::Whole(value) => Ok(Amount(value)),
            RawAmount::Fractional(value) => {
                if !value.is_finite() || value < 0.0 {
                    return Err(D::Error::custom(format!("amount must be non-negative, got {}", value)));
                }
                Ok(Amount(value.round() as u64))
            }
            RawAmount::Text(text) => {
                let digits: String = text
                    .trim()
                    .trim_end_matches(|c: char| c == 'đ' || c == 'Đ')
                    .chars()
                    .filter(|c| !matches!(c, '.' | ',' | '_' | ' '))
                    .collect();
                digits
                    .parse::<u64>()
                    .map(Amount)
                    .map_err(|_| D::Error::custom(format!("invalid amount '{}'", text)))
            }
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseStatus {
    Success,
    Error,
    Other(String),
}

impl From<String> for ResponseStatus {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "success" => ResponseStatus::Success,
            "error" => ResponseStatus::Error,
            _ => ResponseStatus::Other(label),
        }
    }
}

impl From<ResponseStatus> for String {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Success => "success".to_string(),
            ResponseStatus::Error => "error".to_string(),
            ResponseStatus::Other(label) => label,
        }
    }
}

// A malformed record must not hide the status and message around it.
fn lenient_record<'de, D: Deserializer<'de>>(
    deserializer: D
) -> Result<Option<TransactionRecord>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(
        value.and_then(|value| match serde_json::from_value::<TransactionRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("ignoring malformed transaction record: {}", e);
                None
            }
        })
    )
}

/// Reply shape the model is instructed to emit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_record", skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionRecord>,
}

impl TransactionData {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ResponseStatus::Success)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, ResponseStatus::Error)
    }

    /// The record to show as a card: present only with a success status.
    pub fn card_record(&self) -> Option<&TransactionRecord> {
        if self.is_success() {
            self.transaction.as_ref()
        } else {
            None
        }
    }
}
