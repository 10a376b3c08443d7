use serde::Serialize;
use std::fmt;

use crate::interpreter::{ interpret, Interpretation };
use crate::models::transaction::{ TransactionData, TransactionRecord, TransactionType };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Red,
    Green,
    Blue,
    Purple,
    Orange,
    Teal,
    Gray,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionCard {
    pub icon: &'static str,
    pub tone: Tone,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub amount: String,
    pub description: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
}

impl TransactionCard {
    pub fn from_record(record: &TransactionRecord) -> Self {
        Self {
            icon: type_icon(&record.kind),
            tone: type_tone(&record.kind),
            kind: record.kind.to_string(),
            category: record.category.to_string(),
            amount: format_vnd(record.amount.value()),
            description: record.description.clone(),
            date: record.date.clone(),
            person: record.person.clone(),
        }
    }
}

/// What a client should draw for one assistant message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum MessageView {
    Pending,
    TransactionCard { card: TransactionCard, message: String },
    ErrorBanner { message: String },
    PlainText { text: String },
}

impl MessageView {
    pub fn is_pending(&self) -> bool {
        matches!(self, MessageView::Pending)
    }
}

/// Chooses a view for `text`. While `finished` is false an unfinished JSON
/// reply stays pending instead of flashing raw braces at the user.
pub fn render(text: &str, finished: bool) -> MessageView {
    match interpret(text) {
        Interpretation::Structured(data) => view_for(&data, text),
        _ if !finished && may_become_json(text) => MessageView::Pending,
        _ => MessageView::PlainText { text: text.to_string() },
    }
}

// Mid-stream, `{...}` can close an inner object before the outer one arrives.
fn may_become_json(text: &str) -> bool {
    let text = text.trim_start();
    text.is_empty() || text.starts_with('{') || text.starts_with("```")
}

pub fn view_for(data: &TransactionData, raw: &str) -> MessageView {
    if let Some(record) = data.card_record() {
        return MessageView::TransactionCard {
            card: TransactionCard::from_record(record),
            message: data.message.clone(),
        };
    }
    if data.is_error() {
        let message = if data.message.trim().is_empty() {
            raw.trim().to_string()
        } else {
            data.message.clone()
        };
        return MessageView::ErrorBanner { message };
    }
    MessageView::PlainText { text: raw.to_string() }
}

pub fn type_icon(kind: &TransactionType) -> &'static str {
    match kind {
        TransactionType::Expense => "💸",
        TransactionType::Income => "💰",
        TransactionType::LoanGive => "🤝",
        TransactionType::LoanReceive => "💳",
        TransactionType::Investment => "📈",
        TransactionType::Saving => "🏦",
        TransactionType::Bill => "📄",
        TransactionType::Other(_) => "💼",
    }
}

pub fn type_tone(kind: &TransactionType) -> Tone {
    match kind {
        TransactionType::Expense => Tone::Red,
        TransactionType::Income => Tone::Green,
        TransactionType::LoanGive => Tone::Blue,
        TransactionType::LoanReceive => Tone::Purple,
        TransactionType::Investment => Tone::Orange,
        TransactionType::Saving => Tone::Teal,
        TransactionType::Bill | TransactionType::Other(_) => Tone::Gray,
    }
}

/// Vietnamese grouping: `25000` → `25.000đ`.
pub fn format_vnd(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped.push('đ');
    grouped
}

impl fmt::Display for MessageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageView::Pending => write!(f, "…"),
            MessageView::TransactionCard { card, message } => {
                writeln!(f, "✔ Giao dịch đã được ghi nhận")?;
                writeln!(f, "  {} Loại:    {}", card.icon, card.category)?;
                writeln!(f, "  Số tiền:   {}", card.amount)?;
                writeln!(f, "  Mô tả:     {}", card.description)?;
                write!(f, "  Ngày:      {}", card.date)?;
                if let Some(person) = &card.person {
                    write!(f, "\n  Người liên quan: {}", person)?;
                }
                if !message.is_empty() {
                    write!(f, "\n  {}", message)?;
                }
                Ok(())
            }
            MessageView::ErrorBanner { message } => write!(f, "⚠ {}", message),
            MessageView::PlainText { text } => write!(f, "{}", text),
        }
    }
}
