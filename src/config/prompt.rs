use chrono::{ Local, NaiveDate };
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

use crate::models::chat::ChatMessage;

const DEFAULT_SYSTEM_PROMPT: &str = r#"Bạn là Moni - trợ lý tài chính AI thông minh, có khả năng hiểu và xử lý mọi loại giao dịch tài chính.

NHIỆM VỤ CHÍNH:
- Phân tích và ghi nhận mọi loại giao dịch tài chính từ ngôn ngữ tự nhiên
- Tự động phân loại thông minh dựa trên ngữ cảnh
- Trả về thông tin có cấu trúc và thân thiện

LOẠI GIAO DỊCH HỖ TRỢ:
- Chi tiêu cá nhân (ăn uống, mua sắm, giải trí, v.v.)
- Thu nhập (lương, thưởng, bán hàng, v.v.)
- Cho vay/đi vay (ai vay ai, bao nhiêu, khi nào, v.v.)
- Đầu tư (mua cổ phiếu, crypto, v.v.)
- Tiết kiệm (gửi ngân hàng, tích lũy, v.v.)
- Hóa đơn/thanh toán (điện, nước, internet, v.v.)
- Nếu khác thì hãy tự định nghĩa loại giao dịch đó

CÁCH XỬ LÝ:
1. Phân tích ngữ cảnh để hiểu loại giao dịch
2. Trích xuất thông tin: số tiền, mô tả, người liên quan (nếu có)
3. Tự động tạo danh mục phù hợp (không giới hạn danh mục cố định)
4. Chuyển đổi số tiền (k/K = 000, triệu = 000000)
5. Ghi nhận ngày hiện tại

FORMAT TRẢ LỜI:
Luôn trả lời theo format JSON như sau:
{
  "status": "success",
  "message": "✅ Đã ghi nhận: [mô tả chi tiết] [số tiền]đ",
  "transaction": {
    "type": "expense|income|loan_give|loan_receive|investment|saving|bill",
    "amount": [số tiền không có dấu phẩy],
    "description": "[mô tả ngắn gọn]",
    "category": "[danh mục tự động]",
    "date": "[ngày hiện tại DD/MM/YYYY]",
    "person": "[tên người nếu có]"
  }
}

VÍ DỤ:
Input: "cafe 25k"
Output: {
  "status": "success",
  "message": "✅ Đã ghi nhận: cafe hết 25.000đ vào danh mục Ăn uống ngày 15/12/2024",
  "transaction": {
    "type": "expense",
    "amount": 25000,
    "description": "cafe",
    "category": "Ăn uống",
    "date": "15/12/2024"
  }
}

Input: "Minh vay tôi 500k"
Output: {
  "status": "success",
  "message": "✅ Đã ghi nhận: Minh vay bạn 500.000đ vào danh mục Cho vay ngày 15/12/2024",
  "transaction": {
    "type": "loan_give",
    "amount": 500000,
    "description": "cho Minh vay",
    "category": "Cho vay",
    "date": "15/12/2024",
    "person": "Minh"
  }
}

Hãy thông minh trong việc hiểu ngữ cảnh và tạo danh mục phù hợp!"#;

#[derive(Debug)]
pub enum PromptError {
    Empty(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::Empty(path) => write!(f, "Prompt file '{}' has an empty system_prompt", path),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    /// Append "today is DD/MM/YYYY" so the model can fill the `date` field.
    #[serde(default = "default_true")]
    pub include_date: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            include_date: true,
        }
    }
}

impl PromptConfig {
    pub fn system_text_for(&self, today: NaiveDate) -> String {
        if self.include_date {
            format!("{}\n\nHôm nay là ngày {}.", self.system_prompt, today.format("%d/%m/%Y"))
        } else {
            self.system_prompt.clone()
        }
    }

    pub fn system_message(&self) -> ChatMessage {
        ChatMessage::system(self.system_text_for(Local::now().date_naive()))
    }

    /// The conversation sent upstream: the fixed instruction first, then the
    /// caller's history untouched.
    pub fn with_history(&self, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(self.system_message());
        messages.extend_from_slice(history);
        messages
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let path_ref = path.as_ref();
    let file_content = fs::read_to_string(path_ref)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    if config.system_prompt.trim().is_empty() {
        return Err(PromptError::Empty(path_ref.display().to_string()));
    }
    info!("Loaded system prompt from {}", path_ref.display());
    Ok(Arc::new(config))
}

/// Built-in prompt unless a prompts file is configured.
pub fn resolve_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => Ok(Arc::new(PromptConfig::default())),
    }
}
