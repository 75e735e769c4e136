//! Node.js Lambda function definitions that carry their own upload info.

use fastpush_update::{
    Bundler, UPLOAD_INFO_METADATA_KEY, UploadInfoMetadata, join_output_value, output_key,
    zip_bundle,
};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::registry::{Dependency, StreamSource};
use crate::{ConstructError, Result};

/// Runtime used when none is given.
pub const DEFAULT_RUNTIME: &str = "nodejs18.x";

/// Exported handler name used when none is given.
pub const DEFAULT_HANDLER: &str = "handler";

const BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Where CloudFormation picks up a function's deployment package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CodeLocation {
    /// Bucket and key are stack parameters, `<id>CodeS3Bucket` and
    /// `<id>CodeS3Key`, supplied at deploy time.
    #[default]
    Parameters,
    /// A zip already uploaded to S3.
    S3 { bucket: String, key: String },
}

impl CodeLocation {
    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::S3 {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Options for a [`FunctionDefinition`].
#[derive(Debug, Clone, Default)]
pub struct FunctionProps {
    /// JavaScript or TypeScript entry file, relative to the project root.
    pub entry: PathBuf,
    /// Exported handler name; defaults to `handler`.
    pub handler: Option<String>,
    /// Must be a Node.js runtime; defaults to `nodejs18.x`.
    pub runtime: Option<String>,
    /// Modules left out of the bundle besides `aws-sdk`. Recorded in the
    /// upload info so later updates bundle the same way.
    pub modules_to_ignore: Vec<String>,
    /// Deployment package location; stack parameters when unset.
    pub code: Option<CodeLocation>,
    /// Sets `AWS_NODEJS_CONNECTION_REUSE_ENABLED=1`; defaults to true.
    pub aws_sdk_connection_reuse: Option<bool>,
    /// Front the function with an HTTP API and expose its URL.
    pub with_http: bool,
    pub environment: BTreeMap<String, String>,
    /// Hooks applied once every function is registered.
    pub dependencies: Vec<Dependency>,
}

impl FunctionProps {
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }

    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    pub fn with_http(mut self) -> Self {
        self.with_http = true;
        self
    }

    pub fn ignore_module(mut self, module: impl Into<String>) -> Self {
        self.modules_to_ignore.push(module.into());
        self
    }

    pub fn code(mut self, code: CodeLocation) -> Self {
        self.code = Some(code);
        self
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// A permission granted to a function's role.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    fn to_json(&self) -> Value {
        json!({
            "Effect": "Allow",
            "Action": self.actions,
            "Resource": self.resources,
        })
    }
}

/// A validated Node.js function and everything it will synthesize to.
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    id: String,
    entry_full_path: PathBuf,
    handler: String,
    runtime: String,
    environment: BTreeMap<String, Value>,
    external_modules: Vec<String>,
    code: CodeLocation,
    statements: Vec<PolicyStatement>,
    event_sources: Vec<StreamSource>,
    with_http: bool,
    pending: Vec<Dependency>,
}

impl FunctionDefinition {
    /// Validate `props`, resolving the entry against the current directory.
    pub fn new(id: impl Into<String>, props: FunctionProps) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::new_in(&cwd, id, props)
    }

    /// Validate `props`, resolving a relative entry against `root`.
    pub fn new_in(root: &Path, id: impl Into<String>, props: FunctionProps) -> Result<Self> {
        let id = id.into();
        let runtime = props
            .runtime
            .unwrap_or_else(|| DEFAULT_RUNTIME.to_string());
        if !runtime.starts_with("nodejs") {
            return Err(ConstructError::UnsupportedRuntime(runtime));
        }

        let is_script = matches!(
            props.entry.extension().and_then(|e| e.to_str()),
            Some("js") | Some("ts")
        );
        if !is_script {
            return Err(ConstructError::UnsupportedEntry(props.entry));
        }

        let entry_full_path = if props.entry.is_absolute() {
            props.entry
        } else {
            root.join(props.entry)
        };
        if !entry_full_path.is_file() {
            return Err(ConstructError::EntryNotFound(entry_full_path));
        }

        let mut environment: BTreeMap<String, Value> = props
            .environment
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        if props.aws_sdk_connection_reuse.unwrap_or(true) {
            environment.insert(
                "AWS_NODEJS_CONNECTION_REUSE_ENABLED".to_string(),
                Value::String("1".to_string()),
            );
        }
        environment.insert(
            "NODE_OPTIONS".to_string(),
            Value::String("--enable-source-maps".to_string()),
        );

        let mut external_modules = vec!["aws-sdk".to_string()];
        for module in props.modules_to_ignore {
            if !external_modules.contains(&module) {
                external_modules.push(module);
            }
        }

        debug!(function = %id, entry = %entry_full_path.display(), "defined function");

        Ok(Self {
            id,
            entry_full_path,
            handler: format!(
                "main.{}",
                props.handler.as_deref().unwrap_or(DEFAULT_HANDLER)
            ),
            runtime,
            environment,
            external_modules,
            code: props.code.unwrap_or_default(),
            statements: Vec::new(),
            event_sources: Vec::new(),
            with_http: props.with_http,
            pending: props.dependencies,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entry_full_path(&self) -> &Path {
        &self.entry_full_path
    }

    /// `main.<handler>`, matching the bundle file name.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn environment(&self) -> &BTreeMap<String, Value> {
        &self.environment
    }

    pub fn external_modules(&self) -> &[String] {
        &self.external_modules
    }

    pub fn code_location(&self) -> &CodeLocation {
        &self.code
    }

    /// Bundle the entry with this function's externals and zip it.
    ///
    /// The archive is what the `Code` location must point at, and matches what
    /// the update flow pushes later.
    pub async fn package(&self, bundler: &dyn Bundler) -> Result<Vec<u8>> {
        let bundle = bundler
            .bundle(&self.entry_full_path, &self.external_modules)
            .await?;
        let zip = zip_bundle(bundle.dir())?;
        debug!(function = %self.id, bytes = zip.len(), "packaged function");
        Ok(zip)
    }

    pub fn policy_statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    pub fn event_sources(&self) -> &[StreamSource] {
        &self.event_sources
    }

    /// Deployed function name, as a template expression.
    pub fn function_name(&self) -> Value {
        json!({ "Ref": self.id })
    }

    pub fn function_arn(&self) -> Value {
        json!({ "Fn::GetAtt": [self.id, "Arn"] })
    }

    /// HTTP endpoint, when the function was defined `with_http`.
    pub fn url(&self) -> Option<Value> {
        self.with_http
            .then(|| json!({ "Fn::GetAtt": [self.http_api_id(), "ApiEndpoint"] }))
    }

    pub fn add_environment(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.environment.insert(key.into(), value.into());
    }

    pub fn add_policy_statement(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn add_event_source(&mut self, source: StreamSource) {
        self.event_sources.push(source);
    }

    pub(crate) fn take_dependencies(&mut self) -> Vec<Dependency> {
        std::mem::take(&mut self.pending)
    }

    /// Condition that keeps the upload-info output out of non-test synths.
    pub fn test_env_condition_id(&self) -> String {
        format!("{}testEnvCondition", self.id)
    }

    /// The `<id>UploadInfoExtended` output: key and body.
    pub fn upload_info_output(&self) -> (String, Value) {
        (
            output_key(&self.id),
            json!({
                "Value": join_output_value(&self.entry_full_path, &self.id, &self.external_modules),
                "Condition": self.test_env_condition_id(),
            }),
        )
    }

    /// Resource metadata entry carrying the same information.
    pub fn upload_info_metadata(&self) -> (String, Value) {
        let metadata =
            UploadInfoMetadata::new(&self.entry_full_path, self.external_modules.clone());
        (
            UPLOAD_INFO_METADATA_KEY.to_string(),
            serde_json::to_value(metadata).unwrap_or(Value::Null),
        )
    }

    fn http_api_id(&self) -> String {
        format!("{}HttpApi", self.id)
    }

    fn role_id(&self) -> String {
        format!("{}ServiceRole", self.id)
    }

    fn code_parameter_ids(&self) -> (String, String) {
        (format!("{}CodeS3Bucket", self.id), format!("{}CodeS3Key", self.id))
    }

    fn code_property(&self) -> Value {
        match &self.code {
            CodeLocation::Parameters => {
                let (bucket, key) = self.code_parameter_ids();
                json!({ "S3Bucket": { "Ref": bucket }, "S3Key": { "Ref": key } })
            }
            CodeLocation::S3 { bucket, key } => json!({ "S3Bucket": bucket, "S3Key": key }),
        }
    }

    /// Template fragment with `Resources`, `Conditions`, `Outputs` and, for
    /// parameterized code, `Parameters`.
    ///
    /// `node_env` is the `NODE_ENV` of the synth; the upload-info output only
    /// materializes when it is `test`.
    pub fn to_template(&self, node_env: &str) -> Value {
        let mut resources = Map::new();
        let mut outputs = Map::new();
        let mut conditions = Map::new();
        let mut parameters = Map::new();

        if self.code == CodeLocation::Parameters {
            let (bucket, key) = self.code_parameter_ids();
            parameters.insert(
                bucket,
                json!({ "Type": "String", "Description": format!("S3 bucket holding the {} package", self.id) }),
            );
            parameters.insert(
                key,
                json!({ "Type": "String", "Description": format!("S3 key of the {} package", self.id) }),
            );
        }

        let (metadata_key, metadata) = self.upload_info_metadata();
        resources.insert(
            self.id.clone(),
            json!({
                "Type": "AWS::Lambda::Function",
                "Properties": {
                    "Code": self.code_property(),
                    "Handler": self.handler,
                    "Runtime": self.runtime,
                    "Role": { "Fn::GetAtt": [self.role_id(), "Arn"] },
                    "Environment": { "Variables": self.environment },
                },
                "DependsOn": [self.role_id()],
                "Metadata": { metadata_key: metadata },
            }),
        );

        resources.insert(
            self.role_id(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "lambda.amazonaws.com" },
                            "Action": "sts:AssumeRole",
                        }],
                    },
                    "ManagedPolicyArns": [BASIC_EXECUTION_POLICY],
                },
            }),
        );

        if !self.statements.is_empty() {
            let statements: Vec<Value> = self.statements.iter().map(PolicyStatement::to_json).collect();
            resources.insert(
                format!("{}DefaultPolicy", self.role_id()),
                json!({
                    "Type": "AWS::IAM::Policy",
                    "Properties": {
                        "PolicyName": format!("{}DefaultPolicy", self.role_id()),
                        "PolicyDocument": { "Version": "2012-10-17", "Statement": statements },
                        "Roles": [{ "Ref": self.role_id() }],
                    },
                }),
            );
        }

        for source in &self.event_sources {
            resources.insert(
                format!("{}DynamoDBEventSource{}", self.id, source.table_id),
                json!({
                    "Type": "AWS::Lambda::EventSourceMapping",
                    "Properties": {
                        "FunctionName": self.function_name(),
                        "EventSourceArn": { "Fn::GetAtt": [source.stream_table_id, "StreamArn"] },
                        "StartingPosition": source.options.starting_position.as_str(),
                        "BatchSize": source.options.batch_size,
                        "BisectBatchOnFunctionError": source.options.bisect_batch_on_error,
                        "MaximumRetryAttempts": source.options.retry_attempts,
                    },
                }),
            );
        }

        if let Some(url) = self.url() {
            resources.insert(
                self.http_api_id(),
                json!({
                    "Type": "AWS::ApiGatewayV2::Api",
                    "Properties": {
                        "Name": self.http_api_id(),
                        "ProtocolType": "HTTP",
                        "Target": self.function_arn(),
                    },
                }),
            );
            resources.insert(
                format!("{}Permission", self.http_api_id()),
                json!({
                    "Type": "AWS::Lambda::Permission",
                    "Properties": {
                        "Action": "lambda:InvokeFunction",
                        "FunctionName": self.function_arn(),
                        "Principal": "apigateway.amazonaws.com",
                    },
                }),
            );
            outputs.insert(format!("{}Url", self.id), json!({ "Value": url }));
        }

        conditions.insert(
            self.test_env_condition_id(),
            json!({ "Fn::Equals": [node_env, "test"] }),
        );
        let (key, output) = self.upload_info_output();
        outputs.insert(key, output);

        let mut fragment = json!({
            "Resources": resources,
            "Conditions": conditions,
            "Outputs": outputs,
        });
        if !parameters.is_empty() {
            fragment["Parameters"] = Value::Object(parameters);
        }
        fragment
    }
}
