// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

//! In-memory doubles for the data store and the text model.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering}
    }
};

use async_trait::async_trait;
use nl2sql_analyst::{
    error::{AppResult, database_error, llm_api_error},
    llm::TextGenerator,
    schema::ForeignKeyDescriptor,
    store::{DataStore, RawColumn},
    value::{DbValue, Row}
};

pub fn column(name: &str, data_type: &str, key: &str) -> RawColumn {
    RawColumn {
        name:      name.to_string(),
        data_type: data_type.to_string(),
        nullable:  key.is_empty(),
        key:       key.to_string(),
        default:   DbValue::Null,
        extra:     if key == "PRI" {
            String::from("auto_increment")
        } else {
            String::new()
        }
    }
}

pub fn row(values: &[(&str, DbValue)]) -> Row {
    values
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub struct FakeTable {
    pub name:         String,
    pub columns:      Vec<RawColumn>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub rows:         Vec<Row>
}

/// Outcome of the next `fetch_rows` call
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    Fail(String)
}

#[derive(Default)]
pub struct FakeStore {
    pub tables:             Vec<FakeTable>,
    query_outcomes:         Mutex<VecDeque<QueryOutcome>>,
    pub executed:           Mutex<Vec<String>>,
    pub list_calls:         AtomicUsize,
    pub describe_calls:     AtomicUsize,
    pub foreign_key_calls:  AtomicUsize,
    pub sample_calls:       AtomicUsize,
    pub fail_list_tables:   AtomicBool,
    pub fail_describe_once: AtomicBool
}

impl FakeStore {
    pub fn new(tables: Vec<FakeTable>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    /// Store with a single `customers` table holding `count` rows
    pub fn customers(count: usize) -> Self {
        let rows = (1..=count)
            .map(|i| {
                row(&[
                    ("id", DbValue::Int(i as i64)),
                    ("name", DbValue::Text(format!("Customer {}", i)))
                ])
            })
            .collect();
        Self::new(vec![FakeTable {
            name: String::from("customers"),
            columns: vec![
                column("id", "int", "PRI"),
                column("name", "varchar(120)", "")
            ],
            foreign_keys: Vec::new(),
            rows
        }])
    }

    pub fn push_outcome(&self, outcome: QueryOutcome) {
        self.query_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn introspection_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn table(&self, name: &str) -> AppResult<&FakeTable> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| database_error(format!("Table '{}' doesn't exist", name)))
    }
}

#[async_trait]
impl DataStore for FakeStore {
    async fn list_tables(&self) -> AppResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_tables.load(Ordering::SeqCst) {
            return Err(database_error("Lost connection to MySQL server"));
        }
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn describe_table(&self, table: &str) -> AppResult<Vec<RawColumn>> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_describe_once.swap(false, Ordering::SeqCst) {
            return Err(database_error("Lost connection during query"));
        }
        Ok(self.table(table)?.columns.clone())
    }

    async fn foreign_keys(&self, table: &str) -> AppResult<Vec<ForeignKeyDescriptor>> {
        self.foreign_key_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table(table)?.foreign_keys.clone())
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> AppResult<Vec<Row>> {
        self.sample_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table(table)?.rows.iter().take(limit).cloned().collect())
    }

    async fn fetch_rows(&self, sql: &str) -> AppResult<Vec<Row>> {
        self.executed.lock().unwrap().push(sql.to_string());
        match self.query_outcomes.lock().unwrap().pop_front() {
            Some(QueryOutcome::Rows(rows)) => Ok(rows),
            Some(QueryOutcome::Fail(message)) => Err(database_error(message)),
            None => Ok(Vec::new())
        }
    }
}

/// Text model replaying scripted answers in order
#[derive(Default)]
pub struct FakeLlm {
    responses:   Mutex<VecDeque<Result<String, String>>>,
    pub prompts: Mutex<Vec<String>>
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl TextGenerator for FakeLlm {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(llm_api_error(message)),
            None => Err(llm_api_error("no scripted response"))
        }
    }
}
