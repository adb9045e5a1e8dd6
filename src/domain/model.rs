use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 匯出檔中的空白數值欄位視為預設值
fn empty_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 舊論壇 `common_member` 表（合併個人資料欄位）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub uid: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub regdate: i64,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub adminid: i32,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub groupid: u32,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub status: i32,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub credits: i64,

    // common_member_profile
    #[serde(default)]
    pub realname: String,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub gender: u8,
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub resideprovince: String,
    #[serde(default)]
    pub residecity: String,
    #[serde(default)]
    pub affiliation: String,
}

/// UCenter `uc_members` 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UcenterMember {
    pub uid: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub regip: String,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub regdate: i64,
    #[serde(default)]
    pub lastloginip: String,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub lastlogintime: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Member,
    UcenterMember,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Member => "member",
            MemberKind::UcenterMember => "ucenter_member",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemberKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(MemberKind::Member),
            "ucenter_member" | "ucenter-member" => Ok(MemberKind::UcenterMember),
            other => Err(format!(
                "unknown member kind '{}', expected 'member' or 'ucenter_member'",
                other
            )),
        }
    }
}

/// 無法解析的來源列，保留位置以便逐筆回報
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRow {
    pub kind: MemberKind,
    pub line: u64,
    /// 無法取得時為 0
    pub uid: u64,
    pub username: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyMemberRecord {
    Member(Member),
    UcenterMember(UcenterMember),
    Malformed(MalformedRow),
}

impl LegacyMemberRecord {
    pub fn uid(&self) -> u64 {
        match self {
            LegacyMemberRecord::Member(m) => m.uid,
            LegacyMemberRecord::UcenterMember(m) => m.uid,
            LegacyMemberRecord::Malformed(row) => row.uid,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            LegacyMemberRecord::Member(m) => &m.username,
            LegacyMemberRecord::UcenterMember(m) => &m.username,
            LegacyMemberRecord::Malformed(row) => &row.username,
        }
    }

    pub fn kind(&self) -> MemberKind {
        match self {
            LegacyMemberRecord::Member(_) => MemberKind::Member,
            LegacyMemberRecord::UcenterMember(_) => MemberKind::UcenterMember,
            LegacyMemberRecord::Malformed(row) => row.kind,
        }
    }
}

/// 送往身分提供者的使用者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetIdentity {
    pub owner: String,
    pub name: String,
    pub created_time: String,
    pub id: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub password: String,
    pub password_salt: String,
    pub password_type: String,
    pub display_name: String,
    pub avatar: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub affiliation: String,
    pub homepage: String,
    pub bio: String,
    pub gender: String,
    pub birthday: String,
    pub score: i64,
    pub is_admin: bool,
    pub is_forbidden: bool,
    pub signup_application: String,
    pub properties: BTreeMap<String, String>,
}
