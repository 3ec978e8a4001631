/// Lệnh từ phía view gửi xuống task kết nối.
#[derive(Debug, Clone)]
pub enum OutboundCommand {
    /// Frame đã được encode, gửi nguyên văn lên server.
    Frame(String),
    /// Đóng kênh chủ động (rời khỏi view).
    Close,
}
