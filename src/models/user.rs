use serde::{Deserialize, Serialize};

/// 当前请求的登录用户，由外部认证服务签发的会话解析而来
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: Option<String>,
}

impl SessionUser {
    pub const SITE_ADMIN_ROLE: &'static str = "admin";

    pub fn is_site_admin(&self) -> bool {
        self.role.as_deref() == Some(Self::SITE_ADMIN_ROLE)
    }
}
