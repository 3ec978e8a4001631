/// Sự kiện từ task kết nối gửi lên view, theo đúng thứ tự nhận từ mạng.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Opened,
    Frame(Vec<u8>),
    /// Phát đúng một lần cho mỗi kết nối; sau đó không còn sự kiện nào.
    Closed(CloseReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The local side closed the channel (view torn down).
    Local,
    Remote { code: Option<u16>, reason: String },
    Failed(String),
}

impl CloseReason {
    /// Anything but a local close means the view lost its channel.
    pub fn is_unexpected(&self) -> bool {
        !matches!(self, CloseReason::Local)
    }

    pub fn describe(&self) -> String {
        match self {
            CloseReason::Local => "closed locally".to_string(),
            CloseReason::Remote { code: Some(code), reason } if !reason.is_empty() => {
                format!("server closed the channel ({code}: {reason})")
            }
            CloseReason::Remote { code: Some(code), .. } => {
                format!("server closed the channel ({code})")
            }
            CloseReason::Remote { code: None, .. } => "server closed the channel".to_string(),
            CloseReason::Failed(err) => format!("transport failure: {err}"),
        }
    }
}
