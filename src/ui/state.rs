use crate::common::UserRef;
use crate::sync::ChatSession;

/// Sự kiện từ các task nền (tìm kiếm, tạo cuộc trò chuyện) gửi lên UI.
#[derive(Debug)]
pub enum UiEvent {
    SearchResults { seq: u64, users: Vec<UserRef> },
    ChatReady(i64),
    DirectoryError(String),
}

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub session: Option<ChatSession>,
    pub peer_input: String,
    pub search_query: String,
    pub search_results: Vec<UserRef>,
    /// Sequence of the newest search; older responses are discarded.
    pub search_seq: u64,
    pub recent_peers: Vec<i64>,
    pub status: Option<String>,
}

impl AppState {
    pub fn new(recent_peers: Vec<i64>) -> Self {
        Self {
            session: None,
            peer_input: String::new(),
            search_query: String::new(),
            search_results: Vec::new(),
            search_seq: 0,
            recent_peers,
            status: None,
        }
    }

    pub fn next_search(&mut self) -> u64 {
        self.search_seq += 1;
        self.search_seq
    }

    pub fn apply_search_results(&mut self, seq: u64, users: Vec<UserRef>) {
        if seq == self.search_seq {
            self.search_results = users;
        } else {
            log::debug!("Discarding stale search results #{seq}");
        }
    }

    pub fn clear_search(&mut self) {
        // Bump so an in-flight request cannot repopulate the list.
        self.search_seq += 1;
        self.search_results.clear();
    }
}
