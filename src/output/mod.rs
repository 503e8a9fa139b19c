//! 输出截断与采集模块
//! 执行历史中的命令、stdout、stderr 各自有硬上限

/// 持久化文本字段的最大字符数
pub const MAX_TEXT_CHARS: usize = 50_000;

/// 进程输出采集的字节上限
///
/// UTF-8 单个字符最多 4 字节，保留足够字节以截出 `MAX_TEXT_CHARS` 个字符。
pub const MAX_CAPTURE_BYTES: usize = MAX_TEXT_CHARS * 4 + 4;

/// 按字符（Unicode 标量值）截断，不会切断多字节字符
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// 按历史记录上限截断
pub fn truncate_for_history(text: &str) -> String {
    truncate_chars(text, MAX_TEXT_CHARS)
}

/// 有上限的输出缓冲区，超出部分丢弃但仍计数
#[derive(Debug, Default)]
pub struct BoundedBuffer {
    bytes: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl BoundedBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        let take = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }

    /// 被丢弃的字节数
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// 转为字符串，非法 UTF-8 以替换字符表示
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
