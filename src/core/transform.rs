use crate::domain::model::{LegacyMemberRecord, Member, MemberKind, TargetIdentity, UcenterMember};
use crate::utils::error::TransformError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

const MAX_USERNAME_CHARS: usize = 100;
const NORMAL_USER: &str = "normal-user";

/// 轉換時需要的組織層級設定
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub organization: String,
    pub signup_application: String,
    /// 空字串表示不設定頭像
    pub avatar_base_url: String,
    pub forbidden_statuses: Vec<i32>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            organization: "built-in".to_string(),
            signup_application: "app-built-in".to_string(),
            avatar_base_url: String::new(),
            forbidden_statuses: vec![-1],
        }
    }
}

pub fn transform(
    record: &LegacyMemberRecord,
    options: &TransformOptions,
) -> Result<TargetIdentity, TransformError> {
    match record {
        LegacyMemberRecord::Member(member) => transform_member(member, options),
        LegacyMemberRecord::UcenterMember(member) => transform_ucenter_member(member, options),
        LegacyMemberRecord::Malformed(row) => Err(TransformError::MalformedRow {
            line: row.line,
            message: row.message.clone(),
        }),
    }
}

pub fn transform_member(
    member: &Member,
    options: &TransformOptions,
) -> Result<TargetIdentity, TransformError> {
    let name = validate_username(member.uid, &member.username)?;
    let created_time = format_timestamp(member.uid, member.regdate)?;

    let mut properties = base_properties(member.uid, MemberKind::Member);
    properties.insert("groupid".to_string(), member.groupid.to_string());

    let display_name = if member.realname.trim().is_empty() {
        name.clone()
    } else {
        member.realname.trim().to_string()
    };

    Ok(TargetIdentity {
        owner: options.organization.clone(),
        created_time,
        id: member.uid.to_string(),
        user_type: NORMAL_USER.to_string(),
        password: member.password.clone(),
        password_salt: String::new(),
        password_type: "md5".to_string(),
        display_name,
        avatar: avatar_url(&options.avatar_base_url, member.uid),
        email: member.email.trim().to_string(),
        phone: member.mobile.trim().to_string(),
        location: join_location(&member.resideprovince, &member.residecity),
        affiliation: member.affiliation.trim().to_string(),
        homepage: member.site.trim().to_string(),
        bio: member.bio.clone(),
        gender: gender_label(member.gender).to_string(),
        birthday: member.birthday.trim().to_string(),
        score: member.credits,
        is_admin: member.adminid == 1,
        is_forbidden: options.forbidden_statuses.contains(&member.status),
        signup_application: options.signup_application.clone(),
        properties,
        name,
    })
}

pub fn transform_ucenter_member(
    member: &UcenterMember,
    options: &TransformOptions,
) -> Result<TargetIdentity, TransformError> {
    let name = validate_username(member.uid, &member.username)?;
    let created_time = format_timestamp(member.uid, member.regdate)?;

    let mut properties = base_properties(member.uid, MemberKind::UcenterMember);
    if !member.regip.is_empty() {
        properties.insert("regip".to_string(), member.regip.clone());
    }
    if !member.lastloginip.is_empty() {
        properties.insert("lastloginip".to_string(), member.lastloginip.clone());
    }
    if member.lastlogintime > 0 {
        properties.insert(
            "lastlogintime".to_string(),
            format_timestamp(member.uid, member.lastlogintime)?,
        );
    }

    Ok(TargetIdentity {
        owner: options.organization.clone(),
        created_time,
        id: member.uid.to_string(),
        user_type: NORMAL_USER.to_string(),
        password: member.password.clone(),
        password_salt: member.salt.clone(),
        password_type: "md5-salt".to_string(),
        display_name: name.clone(),
        avatar: avatar_url(&options.avatar_base_url, member.uid),
        email: member.email.trim().to_string(),
        phone: String::new(),
        location: String::new(),
        affiliation: String::new(),
        homepage: String::new(),
        bio: String::new(),
        gender: String::new(),
        birthday: String::new(),
        score: 0,
        is_admin: false,
        is_forbidden: false,
        signup_application: options.signup_application.clone(),
        properties,
        name,
    })
}

fn validate_username(uid: u64, username: &str) -> Result<String, TransformError> {
    let name = username.trim();
    if name.is_empty() {
        return Err(TransformError::EmptyUsername { uid });
    }
    if name.chars().any(char::is_control) {
        return Err(TransformError::InvalidUsername {
            uid,
            reason: "contains control characters".to_string(),
        });
    }
    let len = name.chars().count();
    if len > MAX_USERNAME_CHARS {
        return Err(TransformError::InvalidUsername {
            uid,
            reason: format!("{} characters, at most {} allowed", len, MAX_USERNAME_CHARS),
        });
    }
    Ok(name.to_string())
}

fn format_timestamp(uid: u64, value: i64) -> Result<String, TransformError> {
    if value < 0 {
        return Err(TransformError::InvalidTimestamp { uid, value });
    }
    DateTime::<Utc>::from_timestamp(value, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
        .ok_or(TransformError::InvalidTimestamp { uid, value })
}

fn base_properties(uid: u64, kind: MemberKind) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    properties.insert("uid".to_string(), uid.to_string());
    properties.insert("source".to_string(), kind.as_str().to_string());
    properties
}

/// Discuz! 頭像路徑：uid 補零到 9 位後切成 000/00/00/00_avatar_big.jpg
fn avatar_url(base_url: &str, uid: u64) -> String {
    if base_url.is_empty() {
        return String::new();
    }
    let padded = format!("{:09}", uid);
    format!(
        "{}/data/avatar/{}/{}/{}/{}_avatar_big.jpg",
        base_url.trim_end_matches('/'),
        &padded[0..3],
        &padded[3..5],
        &padded[5..7],
        &padded[7..9]
    )
}

fn join_location(province: &str, city: &str) -> String {
    format!("{} {}", province.trim(), city.trim()).trim().to_string()
}

fn gender_label(gender: u8) -> &'static str {
    match gender {
        1 => "Male",
        2 => "Female",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(uid: u64, username: &str) -> Member {
        Member {
            uid,
            username: username.to_string(),
            email: "alice@example.com".to_string(),
            password: "5f4dcc3b5aa765d61d8327deb882cf99".to_string(),
            regdate: 1_300_000_000,
            adminid: 0,
            groupid: 10,
            status: 0,
            credits: 42,
            realname: String::new(),
            gender: 2,
            birthday: "1990-01-02".to_string(),
            mobile: String::new(),
            site: "https://alice.example.com".to_string(),
            bio: String::new(),
            resideprovince: "Zhejiang".to_string(),
            residecity: "Hangzhou".to_string(),
            affiliation: String::new(),
        }
    }

    fn ucenter(uid: u64, username: &str) -> UcenterMember {
        UcenterMember {
            uid,
            username: username.to_string(),
            email: "bob@example.com".to_string(),
            password: "e10adc3949ba59abbe56e057f20f883e".to_string(),
            salt: "a1b2c3".to_string(),
            regip: "10.0.0.1".to_string(),
            regdate: 1_300_000_000,
            lastloginip: String::new(),
            lastlogintime: 0,
        }
    }

    #[test]
    fn test_transform_member_maps_fields() {
        let options = TransformOptions {
            organization: "casnode".to_string(),
            signup_application: "app-casnode".to_string(),
            avatar_base_url: "https://bbs.example.com/uc_server/".to_string(),
            forbidden_statuses: vec![-1],
        };
        let user = transform_member(&member(12345, " alice "), &options).unwrap();

        assert_eq!(user.owner, "casnode");
        assert_eq!(user.name, "alice");
        assert_eq!(user.display_name, "alice");
        assert_eq!(user.created_time, "2011-03-13T07:06:40+00:00");
        assert_eq!(user.gender, "Female");
        assert_eq!(user.location, "Zhejiang Hangzhou");
        assert_eq!(user.score, 42);
        assert_eq!(user.password_type, "md5");
        assert!(!user.is_admin);
        assert!(!user.is_forbidden);
        assert_eq!(
            user.avatar,
            "https://bbs.example.com/uc_server/data/avatar/000/01/23/45_avatar_big.jpg"
        );
        assert_eq!(user.properties.get("uid").map(String::as_str), Some("12345"));
        assert_eq!(user.properties.get("source").map(String::as_str), Some("member"));
    }

    #[test]
    fn test_transform_member_admin_and_forbidden() {
        let mut m = member(1, "admin");
        m.adminid = 1;
        m.status = -1;
        m.realname = "Site Admin".to_string();
        let user = transform_member(&m, &TransformOptions::default()).unwrap();

        assert!(user.is_admin);
        assert!(user.is_forbidden);
        assert_eq!(user.display_name, "Site Admin");
        assert_eq!(user.avatar, "");
    }

    #[test]
    fn test_transform_ucenter_member_keeps_salt() {
        let user =
            transform_ucenter_member(&ucenter(7, "bob"), &TransformOptions::default()).unwrap();

        assert_eq!(user.password_salt, "a1b2c3");
        assert_eq!(user.password_type, "md5-salt");
        assert_eq!(user.properties.get("regip").map(String::as_str), Some("10.0.0.1"));
        assert!(!user.properties.contains_key("lastloginip"));
        assert_eq!(
            user.properties.get("source").map(String::as_str),
            Some("ucenter_member")
        );
    }

    #[test]
    fn test_empty_username_is_rejected() {
        let err = transform(
            &LegacyMemberRecord::Member(member(9, "   ")),
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, TransformError::EmptyUsername { uid: 9 });
    }

    #[test]
    fn test_malformed_row_becomes_transform_error() {
        let row = crate::domain::model::MalformedRow {
            kind: MemberKind::Member,
            line: 3,
            uid: 2,
            username: "bob".to_string(),
            message: "field 2: invalid digit found in string".to_string(),
        };
        let err = transform(&LegacyMemberRecord::Malformed(row), &TransformOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            TransformError::MalformedRow {
                line: 3,
                message: "field 2: invalid digit found in string".to_string()
            }
        );
    }

    #[test]
    fn test_control_characters_are_rejected() {
        let err = transform_ucenter_member(&ucenter(3, "bad\u{0}name"), &TransformOptions::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidUsername { uid: 3, .. }));
    }

    #[test]
    fn test_negative_regdate_is_rejected() {
        let mut m = member(4, "carol");
        m.regdate = -5;
        let err = transform_member(&m, &TransformOptions::default()).unwrap_err();
        assert_eq!(err, TransformError::InvalidTimestamp { uid: 4, value: -5 });
    }
}
