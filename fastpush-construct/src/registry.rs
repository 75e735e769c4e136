//! Cross-function wiring: lambdas calling lambdas, tables and their streams.
//!
//! Functions declare what they depend on when they are defined, but the
//! things they depend on may be registered later. [`Registry::initialize`]
//! resolves every pending [`Dependency`] once all of them exist.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::function::{FunctionDefinition, FunctionProps, PolicyStatement};
use crate::naming::snake_to_pascal;
use crate::{ConstructError, Result};

const DYNAMODB_READ_WRITE_ACTIONS: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
    "dynamodb:DescribeTable",
];

/// Where a stream consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartingPosition {
    TrimHorizon,
    Latest,
}

impl StartingPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartingPosition::TrimHorizon => "TRIM_HORIZON",
            StartingPosition::Latest => "LATEST",
        }
    }
}

/// DynamoDB stream event source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub starting_position: StartingPosition,
    pub batch_size: u32,
    pub bisect_batch_on_error: bool,
    pub retry_attempts: u32,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            starting_position: StartingPosition::TrimHorizon,
            batch_size: 10,
            bisect_batch_on_error: true,
            retry_attempts: 3,
        }
    }
}

/// A resolved stream subscription attached to a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    /// Logical id of the subscribed table.
    pub table_id: String,
    /// Logical id of the table that owns the stream.
    pub stream_table_id: String,
    pub options: StreamOptions,
}

/// One stream requested through [`Dependency::Streams`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub table: String,
    pub options: StreamOptions,
}

impl StreamRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            options: StreamOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }
}

type Hook = Arc<dyn Fn(&mut FunctionDefinition) -> Result<()> + Send + Sync>;

/// Something a function needs once the whole stack is registered.
#[derive(Clone)]
pub enum Dependency {
    /// Env `LAMBDA_<NAME>` (and `_URL`) plus an invoke grant, per lambda.
    Lambdas(Vec<String>),
    /// Env `DYNAMODB_<NAME>` plus a read/write grant, per table.
    Tables(Vec<String>),
    /// DynamoDB stream event sources.
    Streams(Vec<StreamRequest>),
    /// Arbitrary hook.
    Custom(Hook),
}

impl Dependency {
    pub fn lambdas<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dependency::Lambdas(names.into_iter().map(Into::into).collect())
    }

    pub fn tables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dependency::Tables(names.into_iter().map(Into::into).collect())
    }

    /// Streams with the default options.
    pub fn streams<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dependency::Streams(names.into_iter().map(StreamRequest::new).collect())
    }

    pub fn custom<F>(hook: F) -> Self
    where
        F: Fn(&mut FunctionDefinition) -> Result<()> + Send + Sync + 'static,
    {
        Dependency::Custom(Arc::new(hook))
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Lambdas(names) => f.debug_tuple("Lambdas").field(names).finish(),
            Dependency::Tables(names) => f.debug_tuple("Tables").field(names).finish(),
            Dependency::Streams(streams) => f.debug_tuple("Streams").field(streams).finish(),
            Dependency::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
struct LambdaEntry {
    function_name: Value,
    function_arn: Value,
    url: Option<Value>,
}

#[derive(Debug, Clone)]
struct TableEntry {
    logical_id: String,
    stream_logical_id: Option<String>,
}

/// Named lambdas and tables of one stack.
#[derive(Debug, Default)]
pub struct Registry {
    lambdas: BTreeMap<String, LambdaEntry>,
    tables: BTreeMap<String, TableEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a function named `SNAKE_CASE` and register it under that name.
    ///
    /// The logical id is the PascalCase form of the name.
    pub fn function(&mut self, name: &str, props: FunctionProps) -> Result<FunctionDefinition> {
        let function = FunctionDefinition::new(snake_to_pascal(name), props)?;
        self.register_lambda(name, &function);
        Ok(function)
    }

    pub fn register_lambda(&mut self, name: impl Into<String>, function: &FunctionDefinition) {
        self.lambdas.insert(
            name.into(),
            LambdaEntry {
                function_name: function.function_name(),
                function_arn: function.function_arn(),
                url: function.url(),
            },
        );
    }

    /// Register a table; `stream_logical_id` names the table whose stream
    /// consumers read, usually the same table.
    pub fn register_table(
        &mut self,
        name: impl Into<String>,
        logical_id: impl Into<String>,
        stream_logical_id: Option<String>,
    ) {
        self.tables.insert(
            name.into(),
            TableEntry {
                logical_id: logical_id.into(),
                stream_logical_id,
            },
        );
    }

    /// Run each function's pending dependencies. Each runs exactly once.
    pub fn initialize(&self, functions: &mut [FunctionDefinition]) -> Result<()> {
        for function in functions.iter_mut() {
            for dependency in function.take_dependencies() {
                debug!(function = function.id(), ?dependency, "applying dependency");
                self.apply(function, &dependency)?;
            }
        }
        Ok(())
    }

    /// Apply one dependency to `function` right away.
    pub fn apply(&self, function: &mut FunctionDefinition, dependency: &Dependency) -> Result<()> {
        match dependency {
            Dependency::Lambdas(names) => self.add_lambdas(function, names),
            Dependency::Tables(names) => self.add_tables(function, names),
            Dependency::Streams(streams) => self.add_streams(function, streams),
            Dependency::Custom(hook) => hook(function),
        }
    }

    fn add_lambdas(&self, function: &mut FunctionDefinition, names: &[String]) -> Result<()> {
        for name in names {
            let lambda = self
                .lambdas
                .get(name)
                .ok_or_else(|| ConstructError::UnknownLambda(name.clone()))?;

            function.add_environment(format!("LAMBDA_{}", name), lambda.function_name.clone());
            if let Some(url) = &lambda.url {
                function.add_environment(format!("LAMBDA_{}_URL", name), url.clone());
            }
            function.add_policy_statement(PolicyStatement {
                actions: vec!["lambda:InvokeFunction".to_string()],
                resources: vec![lambda.function_arn.clone()],
            });
        }
        Ok(())
    }

    fn add_tables(&self, function: &mut FunctionDefinition, names: &[String]) -> Result<()> {
        for name in names {
            let table = self
                .tables
                .get(name)
                .ok_or_else(|| ConstructError::UnknownTable(name.clone()))?;

            function.add_environment(
                format!("DYNAMODB_{}", name),
                json!({ "Ref": table.logical_id }),
            );
            function.add_policy_statement(PolicyStatement {
                actions: DYNAMODB_READ_WRITE_ACTIONS
                    .iter()
                    .map(|a| a.to_string())
                    .collect(),
                resources: vec![
                    json!({ "Fn::GetAtt": [table.logical_id, "Arn"] }),
                    json!({ "Fn::Join": ["", [{ "Fn::GetAtt": [table.logical_id, "Arn"] }, "/index/*"]] }),
                ],
            });
        }
        Ok(())
    }

    fn add_streams(&self, function: &mut FunctionDefinition, streams: &[StreamRequest]) -> Result<()> {
        for request in streams {
            let table = self
                .tables
                .get(&request.table)
                .ok_or_else(|| ConstructError::UnknownTable(request.table.clone()))?;
            let stream_table_id = table
                .stream_logical_id
                .clone()
                .ok_or_else(|| ConstructError::NoStream(request.table.clone()))?;

            function.add_policy_statement(PolicyStatement {
                actions: vec![
                    "dynamodb:DescribeStream".to_string(),
                    "dynamodb:GetRecords".to_string(),
                    "dynamodb:GetShardIterator".to_string(),
                    "dynamodb:ListStreams".to_string(),
                ],
                resources: vec![json!({ "Fn::GetAtt": [stream_table_id, "StreamArn"] })],
            });
            function.add_event_source(StreamSource {
                table_id: table.logical_id.clone(),
                stream_table_id,
                options: request.options.clone(),
            });
        }
        Ok(())
    }
}
