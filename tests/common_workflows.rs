//! Integration tests for common fastpush workflows.
//!
//! A stack is defined with the construct helpers, rendered to a template file,
//! and then driven through the update flow against in-memory AWS fakes.

use async_trait::async_trait;
use fastpush::fastpush_aws::{
    CodeUpdate, FunctionCodeUpdater, StackResourceLister, StackResourcePage, StackResourceSummary,
};
use fastpush::{BundleOutput, Bundler, CacheStore, FunctionUpdater, TemplateFileSynthesizer};
use fastpush_construct::{Dependency, FunctionDefinition, FunctionProps, Registry, stack_template};
use std::path::Path;
use std::sync::{Arc, Mutex};

struct DeployedStack;

#[async_trait]
impl StackResourceLister for DeployedStack {
    async fn list_page(
        &self,
        _stack_name: &str,
        _next_token: Option<&str>,
    ) -> fastpush::fastpush_aws::Result<StackResourcePage> {
        Ok(StackResourcePage {
            summaries: vec![
                StackResourceSummary::new("CreateUser", "api-dev-CreateUser-A1B2C3")
                    .with_type("AWS::Lambda::Function"),
                StackResourceSummary::new("SendMail", "api-dev-SendMail-D4E5F6")
                    .with_type("AWS::Lambda::Function"),
            ],
            next_token: None,
        })
    }
}

/// Copies the entry to `main.js`, recording the externals of each call.
#[derive(Default)]
struct CopyBundler(Mutex<Vec<(String, Vec<String>)>>);

#[async_trait]
impl Bundler for CopyBundler {
    async fn bundle(&self, entry: &Path, external_modules: &[String]) -> fastpush::Result<BundleOutput> {
        let name = entry.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.0.lock().unwrap().push((name, external_modules.to_vec()));
        let dir = tempfile::tempdir()?;
        std::fs::copy(entry, dir.path().join("main.js"))?;
        Ok(BundleOutput::new(dir))
    }
}

#[derive(Default)]
struct Uploads(Mutex<Vec<String>>);

#[async_trait]
impl FunctionCodeUpdater for Uploads {
    async fn update_function_code(
        &self,
        function_name: &str,
        _zip: Vec<u8>,
    ) -> fastpush::fastpush_aws::Result<CodeUpdate> {
        self.0.lock().unwrap().push(function_name.to_string());
        Ok(CodeUpdate {
            function_name: function_name.to_string(),
            ..CodeUpdate::default()
        })
    }
}

fn define_stack(project: &Path) -> std::path::PathBuf {
    std::fs::create_dir_all(project.join("src")).unwrap();
    std::fs::write(project.join("src/create-user.ts"), "export const handler = async () => 1;").unwrap();
    std::fs::write(project.join("src/send-mail.js"), "exports.handler = async () => 2;").unwrap();

    let mut registry = Registry::new();
    let create_user = FunctionDefinition::new_in(
        project,
        "CreateUser",
        FunctionProps::new("src/create-user.ts").depends_on(Dependency::lambdas(["SEND_MAIL"])),
    )
    .unwrap();
    let send_mail = FunctionDefinition::new_in(
        project,
        "SendMail",
        FunctionProps::new("src/send-mail.js").ignore_module("nodemailer"),
    )
    .unwrap();
    registry.register_lambda("SEND_MAIL", &send_mail);

    let mut functions = vec![create_user, send_mail];
    registry.initialize(&mut functions).unwrap();

    let path = project.join("cdk.out/Api.template.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, stack_template(&functions, "test").to_string()).unwrap();
    path
}

fn updater(project: &Path, template: &Path, uploads: Arc<Uploads>) -> FunctionUpdater {
    updater_with(project, template, uploads, Arc::new(CopyBundler::default()))
}

fn updater_with(
    project: &Path,
    template: &Path,
    uploads: Arc<Uploads>,
    bundler: Arc<CopyBundler>,
) -> FunctionUpdater {
    FunctionUpdater::new(
        Arc::new(TemplateFileSynthesizer::new(template, "api-dev")),
        Arc::new(DeployedStack),
        bundler,
        uploads,
        CacheStore::new(project.join(".update-function-cache")),
    )
    .working_dir(project)
    .branch(Some("develop".to_string()))
}

#[tokio::test]
async fn test_defined_stack_updates_every_function() {
    let project = tempfile::tempdir().unwrap();
    let template = define_stack(project.path());
    let uploads = Arc::new(Uploads::default());

    let report = updater(project.path(), &template, uploads.clone())
        .run(None)
        .await
        .unwrap();

    assert!(report.is_success());
    let mut pushed = uploads.0.lock().unwrap().clone();
    pushed.sort();
    assert_eq!(
        pushed,
        vec!["api-dev-CreateUser-A1B2C3", "api-dev-SendMail-D4E5F6"]
    );
    assert!(project.path().join(".update-function-cache/develop.cache.json").exists());
}

#[tokio::test]
async fn test_single_function_by_physical_id_after_cache() {
    let project = tempfile::tempdir().unwrap();
    let template = define_stack(project.path());
    let uploads = Arc::new(Uploads::default());

    updater(project.path(), &template, uploads.clone())
        .run(Some("CreateUser"))
        .await
        .unwrap();

    // The template is gone; only the cache can answer now.
    std::fs::remove_file(&template).unwrap();
    let report = updater(project.path(), &template, uploads.clone())
        .run(Some("api-dev-SendMail-D4E5F6"))
        .await
        .unwrap();

    assert!(report.from_cache);
    assert_eq!(report.outcomes[0].target().logical_id, "SendMail");
    assert_eq!(uploads.0.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_bundles_like_the_construct() {
    let project = tempfile::tempdir().unwrap();
    let template = define_stack(project.path());
    let bundler = Arc::new(CopyBundler::default());

    updater_with(project.path(), &template, Arc::new(Uploads::default()), bundler.clone())
        .run(Some("SendMail"))
        .await
        .unwrap();

    assert_eq!(
        *bundler.0.lock().unwrap(),
        vec![(
            "send-mail.js".to_string(),
            vec!["aws-sdk".to_string(), "nodemailer".to_string()]
        )]
    );
}

#[test]
fn test_template_is_deployable() {
    let project = tempfile::tempdir().unwrap();
    let template: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(define_stack(project.path())).unwrap(),
    )
    .unwrap();

    for id in ["CreateUser", "SendMail"] {
        let code = &template["Resources"][id]["Properties"]["Code"];
        assert_eq!(code["S3Bucket"]["Ref"], format!("{}CodeS3Bucket", id));
        assert!(template["Parameters"][format!("{}CodeS3Key", id)].is_object());
    }
}

#[test]
fn test_function_env_references_dependency() {
    let project = tempfile::tempdir().unwrap();
    let template: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(define_stack(project.path())).unwrap(),
    )
    .unwrap();

    let variables = &template["Resources"]["CreateUser"]["Properties"]["Environment"]["Variables"];
    assert_eq!(variables["LAMBDA_SEND_MAIL"], serde_json::json!({ "Ref": "SendMail" }));
    assert_eq!(variables["NODE_OPTIONS"], "--enable-source-maps");
}
