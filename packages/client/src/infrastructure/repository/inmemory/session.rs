//! InMemory Session Store 実装
//!
//! 認証状態（トークンとユーザー）を watch チャネルで保持します。
//! ログアウトは購読者に通知され、接続マネージャはそれを受けて切断します。

use tokio::sync::watch;

use crate::domain::{Session, SessionStore, UserIdentity};

/// インメモリ Session Store 実装
pub struct InMemorySessionStore {
    session: watch::Sender<Session>,
}

impl InMemorySessionStore {
    /// 指定したセッションで作成
    pub fn new(session: Session) -> Self {
        let (tx, _rx) = watch::channel(session);
        Self { session: tx }
    }

    /// サインイン済みのセッションで作成
    pub fn signed_in(token: impl Into<String>, user: UserIdentity) -> Self {
        Self::new(Session::signed_in(token, user))
    }

    /// トークンとユーザーを設定
    pub fn sign_in(&self, token: impl Into<String>, user: UserIdentity) {
        self.session.send_replace(Session::signed_in(token, user));
    }

    /// トークンのみを更新（リフレッシュ）
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.session.send_modify(|session| session.token = Some(token));
    }

    /// セッションを破棄
    pub fn logout(&self) {
        self.session.send_replace(Session::default());
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Session::default())
    }
}

impl SessionStore for InMemorySessionStore {
    fn current(&self) -> Session {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }
}
