//! Common test utilities and fixtures

#![allow(dead_code)]

use patterns::Library;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SQL_JOINS: &str = r#"
name: sql_joins
title: SQL Join Optimization
description: Rewrite joins so the planner can use indexes
category: analytics
difficulty: intermediate
backend_type: sql
use_cases:
  - optimize joins
  - speed up reporting queries
parameters:
  - name: left_table
    type: string
    required: true
  - name: right_table
    type: string
    required: true
templates:
  basic:
    description: Inner join on a shared key
    content: "SELECT * FROM {{left_table}} l JOIN {{right_table}} r ON l.id = r.id"
    required_parameters: [left_table, right_table]
best_practices: Join on indexed columns
"#;

pub const SQL_JOINS_V2: &str = r#"
name: sql_joins.v2
title: SQL Join Optimization (hash joins)
description: Prefer hash joins for large unsorted inputs
category: analytics
difficulty: advanced
backend_type: sql
use_cases:
  - optimize joins
best_practices:
  - Check the join strategy in the query plan
"#;

pub const DUPLICATE_CHECK: &str = r#"
name: duplicate_check
title: Duplicate Detection
description: Find rows that share a natural key
category: validation
difficulty: beginner
backend_type: sql
use_cases:
  - find duplicate records
examples:
  - name: by email
    description: "GROUP BY email HAVING COUNT(*) > 1"
    expected_result: one row per duplicated email
"#;

pub const NO_CATEGORY: &str = r#"
name: broken
title: Missing category
best_practices: Always set a category
"#;

/// Build pattern YAML for a name with a single rule
pub fn simple_pattern(name: &str, category: &str, title: &str) -> String {
    format!(
        "name: {}\ntitle: {}\ndescription: {} pattern\ncategory: {}\ndifficulty: beginner\nbest_practices: keep it simple\n",
        name, title, title, category
    )
}

/// Write a file below `root`, creating parent directories
pub fn write_pattern(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create pattern directory");
    }
    std::fs::write(&path, content).expect("Failed to write pattern file");
    path
}

/// Patterns root holding `sql_joins`, its `v2` variant and `duplicate_check`
pub fn setup_patterns_dir() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_pattern(temp_dir.path(), "sql_joins.yaml", SQL_JOINS);
    write_pattern(temp_dir.path(), "sql_joins.v2.yaml", SQL_JOINS_V2);
    write_pattern(temp_dir.path(), "data_quality/duplicate_check.yml", DUPLICATE_CHECK);
    temp_dir
}

/// Library over a fresh fixture directory
pub fn setup_library() -> (TempDir, Arc<Library>) {
    let temp_dir = setup_patterns_dir();
    let library = Arc::new(Library::with_directory(temp_dir.path()));
    (temp_dir, library)
}

/// Poll `check` until it holds or `timeout` passes
pub async fn wait_for<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
