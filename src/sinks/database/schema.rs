//! QuantumDbLog 数据库表结构定义
//!
//! 表结构固定为三列：`id`、`timestamp`、`log_message`。此模块负责：
//! - 按方言生成建表、探测、插入语句；
//! - 判断目标表是否存在；
//! - 表不存在时建表，存在时校验其列集合。
//!
//! 列校验是单向的：只拒绝预期之外的列，不检查预期列是否齐全。
//! 缺少 `log_message` 的旧表可以通过校验，之后的插入会由数据库报错。

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use crate::config::DatabaseType;
use crate::error::{QuantumDbLogError, Result};
use crate::sinks::database::connection::DatabaseConnection;

/// 主键列名
pub const ID_COLUMN: &str = "id";
/// 时间戳列名
pub const TIMESTAMP_COLUMN: &str = "timestamp";
/// 日志消息列名
pub const MESSAGE_COLUMN: &str = "log_message";
/// `log_message` 列的最大长度（字符）
pub const MESSAGE_MAX_LEN: u32 = 500;
/// PostgreSQL 标识符上限（字节）
pub const POSTGRES_MAX_IDENT_BYTES: usize = 63;
/// MySQL 标识符上限（字符）
pub const MYSQL_MAX_IDENT_CHARS: usize = 64;

/// 列的逻辑类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 自增整型主键
    AutoIncrementId,
    /// 日期时间
    DateTime,
    /// 有长度上限的字符串
    VarChar(u32),
}

/// 单列定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl ColumnSpec {
    fn sql_type(&self, db_type: DatabaseType) -> String {
        match (self.kind, db_type) {
            (ColumnKind::AutoIncrementId, DatabaseType::Sqlite) => {
                "INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT".to_string()
            }
            (ColumnKind::AutoIncrementId, DatabaseType::Postgresql) => {
                "SERIAL NOT NULL PRIMARY KEY".to_string()
            }
            (ColumnKind::AutoIncrementId, DatabaseType::Mysql) => {
                "INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY".to_string()
            }
            (ColumnKind::DateTime, DatabaseType::Postgresql) => "TIMESTAMP".to_string(),
            (ColumnKind::DateTime, _) => "DATETIME".to_string(),
            (ColumnKind::VarChar(len), _) => format!("VARCHAR({})", len),
        }
    }

    fn definition(&self, db_type: DatabaseType) -> String {
        let mut sql = format!("{} {}", quote_ident(db_type, self.name), self.sql_type(db_type));
        // 主键类型串里已经带了 NOT NULL
        if !self.nullable && self.kind != ColumnKind::AutoIncrementId {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

/// 目标表的完整定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    columns: Vec<ColumnSpec>,
    defined_at: NaiveDateTime,
}

impl TableSpec {
    /// 以给定表名定义日志表，同时记下定义时刻作为 `timestamp` 列的默认值。
    pub fn new(name: &str) -> Result<Self> {
        validate_table_name(name)?;

        Ok(Self {
            name: name.to_string(),
            columns: vec![
                ColumnSpec {
                    name: ID_COLUMN,
                    kind: ColumnKind::AutoIncrementId,
                    nullable: false,
                },
                ColumnSpec {
                    name: TIMESTAMP_COLUMN,
                    kind: ColumnKind::DateTime,
                    nullable: false,
                },
                ColumnSpec {
                    name: MESSAGE_COLUMN,
                    kind: ColumnKind::VarChar(MESSAGE_MAX_LEN),
                    nullable: false,
                },
            ],
            defined_at: Local::now().naive_local(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// 定义时刻，即 `timestamp` 列的静态默认值
    pub fn defined_at(&self) -> NaiveDateTime {
        self.defined_at
    }

    /// 预期列名是否包含 `column`
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    /// 建表语句。不带 `IF NOT EXISTS`，只应在确认表不存在后执行。
    pub fn create_table_sql(&self, db_type: DatabaseType) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| c.definition(db_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE {} ({})",
            quote_ident(db_type, &self.name),
            columns
        )
    }

    /// 插入语句，绑定顺序为 (timestamp, log_message)
    pub fn insert_sql(&self, db_type: DatabaseType) -> String {
        let (first, second) = match db_type {
            DatabaseType::Postgresql => ("$1", "$2"),
            DatabaseType::Sqlite | DatabaseType::Mysql => ("?", "?"),
        };
        format!(
            "INSERT INTO {} ({}, {}) VALUES ({}, {})",
            quote_ident(db_type, &self.name),
            quote_ident(db_type, TIMESTAMP_COLUMN),
            quote_ident(db_type, MESSAGE_COLUMN),
            first,
            second
        )
    }
}

/// 校验表名：非空，且不含 NUL。
///
/// 表名在 DDL 和插入语句中按方言加引号，在探测语句中作为绑定参数，
/// 所以任意字符串都可以作为表名。
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(QuantumDbLogError::InvalidTableName(name.to_string()));
    }
    Ok(())
}

/// 在 `validate_table_name` 的基础上检查后端的标识符长度上限。SQLite 没有上限。
pub fn validate_table_name_for(db_type: DatabaseType, name: &str) -> Result<()> {
    validate_table_name(name)?;
    let too_long = match db_type {
        DatabaseType::Sqlite => false,
        DatabaseType::Postgresql => name.len() > POSTGRES_MAX_IDENT_BYTES,
        DatabaseType::Mysql => name.chars().count() > MYSQL_MAX_IDENT_CHARS,
    };
    if too_long {
        return Err(QuantumDbLogError::InvalidTableName(format!(
            "{} (超过 {} 标识符长度上限)",
            name, db_type
        )));
    }
    Ok(())
}

/// 按方言给标识符加引号，内部的引号字符成对转义
pub fn quote_ident(db_type: DatabaseType, ident: &str) -> String {
    match db_type {
        DatabaseType::Mysql => format!("`{}`", ident.replace('`', "``")),
        DatabaseType::Sqlite | DatabaseType::Postgresql => {
            format!("\"{}\"", ident.replace('"', "\"\""))
        }
    }
}

/// 查询表是否存在的语句，表名作为唯一的绑定参数，结果列统一命名为 `name`
pub fn table_exists_sql(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::Sqlite => {
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE"
        }
        DatabaseType::Postgresql => {
            "SELECT table_name::text AS name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1"
        }
        DatabaseType::Mysql => {
            "SELECT TABLE_NAME AS name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
        }
    }
}

/// 按列序读取现有列名的语句，表名作为唯一的绑定参数
pub fn column_names_sql(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::Sqlite => "SELECT name FROM pragma_table_info(?) ORDER BY cid",
        DatabaseType::Postgresql => {
            "SELECT column_name::text AS name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position"
        }
        DatabaseType::Mysql => {
            "SELECT COLUMN_NAME AS name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ORDINAL_POSITION"
        }
    }
}

/// 对比现有列与预期列，返回第一个预期之外的列。
pub fn check_columns<S: AsRef<str>>(spec: &TableSpec, existing: &[S]) -> Result<()> {
    for column in existing {
        let column: &str = column.as_ref();
        if !spec.has_column(column) {
            return Err(QuantumDbLogError::schema_mismatch(spec.name(), column));
        }
    }
    Ok(())
}

/// 构造期间表结构处理的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// 表原本不存在，已新建
    Created,
    /// 表已存在且通过校验
    Validated,
}

/// 判断表是否存在。不存在是正常的 `false`，只有连接或查询失败才返回错误。
pub fn table_exists(conn: &mut DatabaseConnection, table: &str) -> Result<bool> {
    let sql = table_exists_sql(conn.database_type());
    let names = conn
        .load_names(sql, table)
        .map_err(|e| QuantumDbLogError::database(format!("查询表 {} 是否存在失败: {}", table, e)))?;
    Ok(!names.is_empty())
}

/// 建表
pub fn create_table(conn: &mut DatabaseConnection, spec: &TableSpec) -> Result<()> {
    let sql = spec.create_table_sql(conn.database_type());
    debug!("创建日志表: {}", sql);
    conn.execute(&sql)
        .map_err(|e| QuantumDbLogError::database(format!("表 {} 创建失败: {}", spec.name(), e)))?;
    Ok(())
}

/// 读取现有表的列并校验
pub fn validate_schema(conn: &mut DatabaseConnection, table: &str, spec: &TableSpec) -> Result<()> {
    let sql = column_names_sql(conn.database_type());
    let columns = conn
        .load_names(sql, table)
        .map_err(|e| QuantumDbLogError::database(format!("读取表 {} 的列失败: {}", table, e)))?;
    debug!("表 {} 现有列: {:?}", table, columns);
    check_columns(spec, &columns)
}

/// 构造期间只运行一次：表不存在则建表，存在则校验。
pub fn ensure_table(conn: &mut DatabaseConnection, spec: &TableSpec) -> Result<SchemaState> {
    if table_exists(conn, spec.name())? {
        validate_schema(conn, spec.name(), spec)?;
        Ok(SchemaState::Validated)
    } else {
        create_table(conn, spec)?;
        Ok(SchemaState::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_spec_columns() {
        let spec = TableSpec::new("app_logs").unwrap();
        let names: Vec<_> = spec.columns().iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["id", "timestamp", "log_message"]);
        assert!(spec.columns().iter().all(|c| !c.nullable));
    }

    #[test]
    fn test_create_table_sql_per_dialect() {
        let spec = TableSpec::new("app_logs").unwrap();

        let sqlite = spec.create_table_sql(DatabaseType::Sqlite);
        assert_eq!(
            sqlite,
            "CREATE TABLE \"app_logs\" (\"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \
             \"timestamp\" DATETIME NOT NULL, \"log_message\" VARCHAR(500) NOT NULL)"
        );

        let pg = spec.create_table_sql(DatabaseType::Postgresql);
        assert!(pg.contains("\"id\" SERIAL NOT NULL PRIMARY KEY"));
        assert!(pg.contains("\"timestamp\" TIMESTAMP NOT NULL"));

        let mysql = spec.create_table_sql(DatabaseType::Mysql);
        assert!(mysql.starts_with("CREATE TABLE `app_logs`"));
        assert!(mysql.contains("`id` INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY"));
        assert!(mysql.contains("`log_message` VARCHAR(500) NOT NULL"));
        assert!(!mysql.contains("IF NOT EXISTS"));
    }

    #[test]
    fn test_insert_sql_placeholders() {
        let spec = TableSpec::new("app_logs").unwrap();
        assert_eq!(
            spec.insert_sql(DatabaseType::Sqlite),
            "INSERT INTO \"app_logs\" (\"timestamp\", \"log_message\") VALUES (?, ?)"
        );
        assert!(spec.insert_sql(DatabaseType::Postgresql).ends_with("VALUES ($1, $2)"));
        assert!(spec.insert_sql(DatabaseType::Mysql).contains("`log_message`"));
    }

    #[test]
    fn test_introspection_sql_binds_table_name() {
        assert!(table_exists_sql(DatabaseType::Sqlite).contains("name = ?"));
        assert!(column_names_sql(DatabaseType::Sqlite).contains("pragma_table_info(?)"));
        assert!(table_exists_sql(DatabaseType::Postgresql).contains("table_name = $1"));
        assert!(column_names_sql(DatabaseType::Postgresql).contains("table_name = $1"));
        assert!(table_exists_sql(DatabaseType::Mysql).contains("table_name = ?"));
        assert!(column_names_sql(DatabaseType::Mysql).contains("table_name = ?"));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident(DatabaseType::Sqlite, "app-logs"), "\"app-logs\"");
        assert_eq!(quote_ident(DatabaseType::Postgresql, "a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_ident(DatabaseType::Mysql, "a`b"), "`a``b`");

        let spec = TableSpec::new("App Logs").unwrap();
        assert!(spec
            .create_table_sql(DatabaseType::Sqlite)
            .starts_with("CREATE TABLE \"App Logs\" ("));
    }

    #[test]
    fn test_check_columns_reports_first_foreign_column() {
        let spec = TableSpec::new("app_logs").unwrap();
        let err = check_columns(&spec, &["id", "extra_col", "other"]).unwrap_err();
        match err {
            QuantumDbLogError::SchemaMismatch { table, column } => {
                assert_eq!(table, "app_logs");
                assert_eq!(column, "extra_col");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_columns_is_one_directional() {
        let spec = TableSpec::new("app_logs").unwrap();
        // 缺列不报错
        assert!(check_columns(&spec, &["id"]).is_ok());
        assert!(check_columns::<&str>(&spec, &[]).is_ok());
    }

    #[test]
    fn test_table_name_validation() {
        for name in ["app_logs", "app-logs", "App Logs", "日志", "1logs", "it's"] {
            assert!(validate_table_name(name).is_ok(), "{}", name);
        }
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("logs\0").is_err());
    }

    #[test]
    fn test_table_name_length_per_backend() {
        let long = "a".repeat(POSTGRES_MAX_IDENT_BYTES + 1);
        assert!(validate_table_name_for(DatabaseType::Sqlite, &long).is_ok());
        assert!(validate_table_name_for(DatabaseType::Mysql, &long).is_ok());
        assert!(matches!(
            validate_table_name_for(DatabaseType::Postgresql, &long),
            Err(QuantumDbLogError::InvalidTableName(_))
        ));

        // PostgreSQL 按字节计，MySQL 按字符计
        let wide = "日".repeat(30);
        assert!(validate_table_name_for(DatabaseType::Postgresql, &wide).is_err());
        assert!(validate_table_name_for(DatabaseType::Mysql, &wide).is_ok());
        assert!(validate_table_name_for(DatabaseType::Mysql, &"b".repeat(65)).is_err());
    }

    fn expected_subset() -> impl Strategy<Value = Vec<&'static str>> {
        proptest::sample::subsequence(vec![ID_COLUMN, TIMESTAMP_COLUMN, MESSAGE_COLUMN], 0..=3)
            .prop_shuffle()
    }

    proptest! {
        #[test]
        fn prop_subset_of_expected_columns_passes(columns in expected_subset()) {
            let spec = TableSpec::new("app_logs").unwrap();
            prop_assert!(check_columns(&spec, &columns).is_ok());
        }

        #[test]
        fn prop_foreign_column_fails(
            columns in expected_subset(),
            foreign in "[a-z_][a-z0-9_]{0,20}",
            position in 0usize..4,
        ) {
            prop_assume!(![ID_COLUMN, TIMESTAMP_COLUMN, MESSAGE_COLUMN].contains(&foreign.as_str()));
            let spec = TableSpec::new("app_logs").unwrap();
            let mut existing: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            let at = position.min(existing.len());
            existing.insert(at, foreign.clone());

            let err = check_columns(&spec, &existing).unwrap_err();
            let reported = matches!(
                err,
                QuantumDbLogError::SchemaMismatch { ref column, .. } if *column == foreign
            );
            prop_assert!(reported, "expected SchemaMismatch for {}", foreign);
        }

        #[test]
        fn prop_non_empty_names_accepted(name in "[^\\x00]{1,80}") {
            prop_assert!(validate_table_name_for(DatabaseType::Sqlite, &name).is_ok());
        }

        #[test]
        fn prop_quoted_ident_unescapes_to_name(name in "[a-z\"` ;'-]{1,20}") {
            let quoted = quote_ident(DatabaseType::Sqlite, &name);
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert_eq!(inner.replace("\"\"", "\""), name.clone());

            let quoted = quote_ident(DatabaseType::Mysql, &name);
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert_eq!(inner.replace("``", "`"), name);
        }
    }
}
