use crate::domain::model::{LegacyMemberRecord, MalformedRow, Member, MemberKind, UcenterMember};
use crate::domain::ports::{SourceStore, Storage};
use crate::utils::error::{MigrationError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub const DEFAULT_MEMBERS_FILE: &str = "members.csv";
pub const DEFAULT_UCENTER_MEMBERS_FILE: &str = "ucenter_members.csv";

/// 從匯出的 CSV 讀取舊論壇會員；第一列必須是欄位名稱
pub struct CsvMemberSource<S: Storage> {
    storage: S,
    members_file: String,
    ucenter_members_file: String,
}

impl<S: Storage> CsvMemberSource<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            members_file: DEFAULT_MEMBERS_FILE.to_string(),
            ucenter_members_file: DEFAULT_UCENTER_MEMBERS_FILE.to_string(),
        }
    }

    pub fn with_files(
        mut self,
        members_file: impl Into<String>,
        ucenter_members_file: impl Into<String>,
    ) -> Self {
        self.members_file = members_file.into();
        self.ucenter_members_file = ucenter_members_file.into();
        self
    }

    async fn read_records<T, F>(
        &self,
        file: &str,
        kind: MemberKind,
        wrap: F,
    ) -> Result<Vec<LegacyMemberRecord>>
    where
        T: DeserializeOwned + Send,
        F: Fn(T) -> LegacyMemberRecord + Send,
    {
        tracing::debug!("Reading legacy members from {}", file);
        let data = self.storage.read_file(file).await?;
        let records = parse_rows(file, kind, &data, wrap)?;

        let malformed = records
            .iter()
            .filter(|r| matches!(r, LegacyMemberRecord::Malformed(_)))
            .count();
        if malformed > 0 {
            tracing::warn!("{} rows in {} could not be parsed", malformed, file);
        }
        tracing::info!("Read {} {} rows from {}", records.len(), kind, file);
        Ok(records)
    }
}

/// 逐列解析；單列格式錯誤保留為 [`LegacyMemberRecord::Malformed`]，
/// 只有讀不到標題列或 I/O 錯誤才讓整個檔案失敗。
fn parse_rows<T, F>(
    file: &str,
    kind: MemberKind,
    data: &[u8],
    wrap: F,
) -> Result<Vec<LegacyMemberRecord>>
where
    T: DeserializeOwned,
    F: Fn(T) -> LegacyMemberRecord,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| MigrationError::SourceError {
            message: format!("{}: cannot read header row: {}", file, e),
        })?
        .clone();
    let uid_column = headers.iter().position(|h| h == "uid");
    let username_column = headers.iter().position(|h| h == "username");

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                return Err(MigrationError::SourceError {
                    message: format!("{}: {}", file, e),
                });
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                tracing::warn!("{} line {}: {}", file, line, e);
                rows.push(LegacyMemberRecord::Malformed(MalformedRow {
                    kind,
                    line,
                    uid: 0,
                    username: String::new(),
                    message: e.to_string(),
                }));
                continue;
            }
        };

        match record.deserialize::<T>(Some(&headers)) {
            Ok(row) => rows.push(wrap(row)),
            Err(e) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                tracing::warn!("{} line {}: {}", file, line, e);
                rows.push(LegacyMemberRecord::Malformed(MalformedRow {
                    kind,
                    line,
                    uid: uid_column
                        .and_then(|i| record.get(i))
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0),
                    username: username_column
                        .and_then(|i| record.get(i))
                        .unwrap_or_default()
                        .to_string(),
                    message: e.to_string(),
                }));
            }
        }
    }
    Ok(rows)
}

#[async_trait]
impl<S: Storage> SourceStore for CsvMemberSource<S> {
    async fn list_members(&self) -> Result<Vec<LegacyMemberRecord>> {
        self.read_records::<Member, _>(
            &self.members_file,
            MemberKind::Member,
            LegacyMemberRecord::Member,
        )
        .await
    }

    async fn list_ucenter_members(&self) -> Result<Vec<LegacyMemberRecord>> {
        self.read_records::<UcenterMember, _>(
            &self.ucenter_members_file,
            MemberKind::UcenterMember,
            LegacyMemberRecord::UcenterMember,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(data: &str) -> Vec<LegacyMemberRecord> {
        parse_rows::<Member, _>(
            "members.csv",
            MemberKind::Member,
            data.as_bytes(),
            LegacyMemberRecord::Member,
        )
        .unwrap()
    }

    fn member_at(records: &[LegacyMemberRecord], i: usize) -> &Member {
        match &records[i] {
            LegacyMemberRecord::Member(m) => m,
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_parse_members_with_missing_profile_columns() {
        let records = members(
            "uid,username,email,password,regdate,adminid,groupid,status,credits\n\
             1,admin,admin@example.com,abc,1300000000,1,1,0,100\n\
             2,alice,alice@example.com,def,1300000001,0,10,-1,5\n",
        );

        assert_eq!(records.len(), 2);
        assert_eq!(member_at(&records, 0).username, "admin");
        assert_eq!(member_at(&records, 0).adminid, 1);
        assert_eq!(member_at(&records, 1).status, -1);
        assert_eq!(member_at(&records, 1).realname, "");
    }

    #[test]
    fn test_blank_and_padded_numeric_cells() {
        let records = members(
            "uid,username,regdate,credits,gender\n\
             1,alice,1300000000, 5 ,\n\
             2,bob,1300000001,,2\n",
        );

        assert_eq!(records.len(), 2);
        assert_eq!(member_at(&records, 0).credits, 5);
        assert_eq!(member_at(&records, 0).gender, 0);
        assert_eq!(member_at(&records, 1).credits, 0);
        assert_eq!(member_at(&records, 1).gender, 2);
    }

    #[test]
    fn test_bad_row_is_kept_in_place_as_malformed() {
        let records = parse_rows::<UcenterMember, _>(
            "ucenter_members.csv",
            MemberKind::UcenterMember,
            "uid,username,regdate\n1,alice,1300000000\n2,bob,yesterday\n3,carol,1300000002\n"
                .as_bytes(),
            LegacyMemberRecord::UcenterMember,
        )
        .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].username(), "alice");
        assert_eq!(records[2].username(), "carol");
        match &records[1] {
            LegacyMemberRecord::Malformed(row) => {
                assert_eq!(row.kind, MemberKind::UcenterMember);
                assert_eq!(row.line, 3);
                assert_eq!(row.uid, 2);
                assert_eq!(row.username, "bob");
            }
            other => panic!("unexpected record: {:?}", other),
        }
        assert_eq!(records[1].kind(), MemberKind::UcenterMember);
    }
}
