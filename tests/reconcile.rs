//! End-to-end synchronization runs against an in-memory platform.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use strigo_sync::config::{
    ClassConfig, ContentHasher, FragmentRef, ImageSpec, PresentationConfig, ResourceConfig,
    ScriptRef, ViewInterfaceSetting,
};
use strigo_sync::error::{ApiError, Result, SyncError};
use strigo_sync::planner::{ActionType, NotesTarget, Operation, RemoteSnapshot};
use strigo_sync::platform::{
    Class, ClassRequest, Note, Presentation, RemoteApi, Resource, ResourceRequest, WebviewLink,
};
use strigo_sync::reconciler::Reconciler;
use strigo_sync::resolve::{FragmentSource, ImageCatalog, ScriptFolder, ScriptResolver};

// ============================================================================
// In-memory platform
// ============================================================================

#[derive(Debug, Default)]
struct Platform {
    classes: Vec<Class>,
    presentations: Vec<Presentation>,
    notes: HashMap<String, Vec<Note>>,
    next_id: u32,
    calls: Vec<String>,
    fail_on: Option<&'static str>,
}

impl Platform {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn record(&mut self, call: &'static str) -> Result<()> {
        self.calls.push(call.to_string());
        if self.fail_on == Some(call) {
            return Err(SyncError::Api(ApiError::Transport {
                method: String::from("POST"),
                path: String::from(call),
                status: 500,
                body: String::from("boom"),
            }));
        }
        Ok(())
    }

    fn class_mut(&mut self, class_id: &str) -> Result<&mut Class> {
        self.classes
            .iter_mut()
            .find(|c| c.id == class_id)
            .ok_or_else(not_found)
    }
}

fn not_found() -> SyncError {
    SyncError::Api(ApiError::Failure {
        status: 404,
        kind: String::from("NotFound"),
        message: String::from("not found"),
    })
}

#[derive(Debug, Default, Clone)]
struct FakeApi {
    platform: Arc<Mutex<Platform>>,
}

impl FakeApi {
    fn with_class(class: Class) -> Self {
        let api = Self::default();
        api.platform.lock().unwrap().classes.push(class);
        api
    }

    fn class(&self, class_id: &str) -> Class {
        self.platform
            .lock()
            .unwrap()
            .classes
            .iter()
            .find(|c| c.id == class_id)
            .cloned()
            .unwrap()
    }

    fn calls(&self) -> Vec<String> {
        self.platform.lock().unwrap().calls.clone()
    }

    fn fail_on(&self, call: &'static str) {
        self.platform.lock().unwrap().fail_on = Some(call);
    }

    fn recover(&self) {
        self.platform.lock().unwrap().fail_on = None;
    }
}

fn apply_request(resource: &mut Resource, request: &ResourceRequest) {
    resource.name.clone_from(&request.name);
    resource.image_id.clone_from(&request.image_id);
    resource.image_user.clone_from(&request.image_user);
    if let Some(links) = &request.webview_links {
        resource.webview_links.clone_from(links);
    }
    if let Some(script) = &request.post_launch_script {
        resource.post_launch_script = Some(script.clone());
    }
    if let Some(script) = &request.userdata {
        resource.userdata = Some(script.clone());
    }
    if let Some(region) = &request.ec2_region {
        resource.ec2_region = Some(region.clone());
    }
    if let Some(instance_type) = &request.instance_type {
        resource.instance_type = Some(instance_type.clone());
    }
    if let Some(mapping) = &request.image_region_mapping {
        resource.image_region_mapping = Some(mapping.clone());
    }
    if let Some(interface) = request.view_interface {
        resource.view_interface = interface;
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn list_classes(&self) -> Result<Vec<Class>> {
        Ok(self.platform.lock().unwrap().classes.clone())
    }

    async fn get_class(&self, class_id: &str) -> Result<Class> {
        let mut platform = self.platform.lock().unwrap();
        Ok(platform.class_mut(class_id)?.clone())
    }

    async fn create_class(&self, request: &ClassRequest) -> Result<Class> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("create_class")?;
        let class = Class {
            id: platform.id("class"),
            name: request.name.clone(),
            description: Some(request.description.clone()),
            labels: request.labels.clone(),
            owner: None,
            resources: Vec::new(),
            presentation_notes: Vec::new(),
            presentation_filename: None,
            created_at: None,
            updated_at: None,
        };
        platform.classes.push(class.clone());
        Ok(class)
    }

    async fn update_class(&self, class_id: &str, request: &ClassRequest) -> Result<Class> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("update_class")?;
        let class = platform.class_mut(class_id)?;
        class.name.clone_from(&request.name);
        class.description = Some(request.description.clone());
        class.labels.clone_from(&request.labels);
        Ok(class.clone())
    }

    async fn delete_class(&self, class_id: &str) -> Result<()> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("delete_class")?;
        platform.classes.retain(|c| c.id != class_id);
        Ok(())
    }

    async fn list_presentations(&self, class_id: &str) -> Result<Vec<Presentation>> {
        let platform = self.platform.lock().unwrap();
        Ok(platform
            .presentations
            .iter()
            .filter(|p| p.class_id == class_id)
            .cloned()
            .collect())
    }

    async fn get_presentation(&self, class_id: &str, presentation_id: &str) -> Result<Presentation> {
        let platform = self.platform.lock().unwrap();
        platform
            .presentations
            .iter()
            .find(|p| p.class_id == class_id && p.id == presentation_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_presentation(&self, class_id: &str, file: &Path) -> Result<Presentation> {
        let hasher = ContentHasher::new();
        let size_bytes = hasher.file_size(file)?;
        let md5 = hasher.md5_file(file)?;

        let mut platform = self.platform.lock().unwrap();
        platform.record("create_presentation")?;
        let presentation = Presentation {
            id: platform.id("presentation"),
            class_id: class_id.to_string(),
            md5,
            size_bytes,
            filename: file.file_name().unwrap().to_string_lossy().into_owned(),
            upload_date: None,
        };
        platform.presentations.push(presentation.clone());
        Ok(presentation)
    }

    async fn delete_presentation(&self, _class_id: &str, presentation_id: &str) -> Result<()> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("delete_presentation")?;
        platform.presentations.retain(|p| p.id != presentation_id);
        platform.notes.remove(presentation_id);
        Ok(())
    }

    async fn get_notes(&self, _class_id: &str, presentation_id: &str) -> Result<Vec<Note>> {
        let platform = self.platform.lock().unwrap();
        Ok(platform.notes.get(presentation_id).cloned().unwrap_or_default())
    }

    async fn create_notes(&self, _class_id: &str, presentation_id: &str, notes: &[Note]) -> Result<()> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("create_notes")?;
        platform.notes.insert(presentation_id.to_string(), notes.to_vec());
        Ok(())
    }

    async fn delete_notes(&self, _class_id: &str, presentation_id: &str) -> Result<()> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("delete_notes")?;
        platform.notes.remove(presentation_id);
        Ok(())
    }

    async fn list_resources(&self, class_id: &str) -> Result<Vec<Resource>> {
        let mut platform = self.platform.lock().unwrap();
        Ok(platform.class_mut(class_id)?.resources.clone())
    }

    async fn get_resource(&self, class_id: &str, resource_id: &str) -> Result<Resource> {
        let mut platform = self.platform.lock().unwrap();
        platform
            .class_mut(class_id)?
            .resources
            .iter()
            .find(|r| r.id == resource_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_resource(&self, class_id: &str, request: &ResourceRequest) -> Result<Resource> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("create_resource")?;
        let mut resource = Resource {
            id: platform.id("resource"),
            kind: String::from("ec2"),
            name: String::new(),
            image_id: String::new(),
            image_user: String::new(),
            is_custom_image: false,
            view_interface: None,
            webview_links: Vec::new(),
            post_launch_script: None,
            userdata: None,
            ec2_region: None,
            instance_type: None,
            image_region_mapping: None,
        };
        apply_request(&mut resource, request);
        platform.class_mut(class_id)?.resources.push(resource.clone());
        Ok(resource)
    }

    async fn update_resource(
        &self,
        class_id: &str,
        resource_id: &str,
        request: &ResourceRequest,
    ) -> Result<Resource> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("update_resource")?;
        let resource = platform
            .class_mut(class_id)?
            .resources
            .iter_mut()
            .find(|r| r.id == resource_id)
            .ok_or_else(not_found)?;
        apply_request(resource, request);
        Ok(resource.clone())
    }

    async fn delete_resource(&self, class_id: &str, resource_id: &str) -> Result<()> {
        let mut platform = self.platform.lock().unwrap();
        platform.record("delete_resource")?;
        platform
            .class_mut(class_id)?
            .resources
            .retain(|r| r.id != resource_id);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct LibrarySource;

#[async_trait]
impl FragmentSource for LibrarySource {
    async fn fetch(&self, script: &str, version: &str, folder: ScriptFolder) -> Result<String> {
        Ok(format!(
            "#!/bin/bash\n# {folder}/{script}@{version}\n\necho \"installing {script}\"\n"
        ))
    }
}

fn reconciler(api: &FakeApi) -> Reconciler {
    Reconciler::new(
        Arc::new(api.clone()),
        ScriptResolver::new(Arc::new(LibrarySource)),
    )
}

fn resource(name: &str) -> ResourceConfig {
    ResourceConfig {
        name: name.to_string(),
        instance_type: String::from("t3.medium"),
        image: ImageSpec::Named(String::from("ubuntu-20.04")),
        is_windows: None,
        init_scripts: Vec::new(),
        post_launch_scripts: Vec::new(),
        view_interface: ViewInterfaceSetting::Unset,
        webview_links: Vec::new(),
    }
}

fn remote_resource(id: &str, name: &str) -> Resource {
    let image = ImageCatalog::resolve(&ImageSpec::Named(String::from("ubuntu-20.04"))).unwrap();
    Resource {
        id: id.to_string(),
        kind: String::from("ec2"),
        name: name.to_string(),
        image_id: image.id,
        image_user: image.user,
        is_custom_image: false,
        view_interface: None,
        webview_links: Vec::new(),
        post_launch_script: None,
        userdata: None,
        ec2_region: Some(image.region),
        instance_type: Some(String::from("t3.medium")),
        image_region_mapping: Some(image.region_mapping),
    }
}

fn remote_class(name: &str, resources: Vec<Resource>) -> Class {
    Class {
        id: String::from("c1"),
        name: name.to_string(),
        description: None,
        labels: Vec::new(),
        owner: None,
        resources,
        presentation_notes: Vec::new(),
        presentation_filename: None,
        created_at: None,
        updated_at: None,
    }
}

/// Writes a presentation and its slide sources.
fn write_material(root: &Path, notes: &[&str]) -> PresentationConfig {
    let pdf = root.join("PDF");
    let slides = root.join("Slides");
    std::fs::create_dir_all(&pdf).unwrap();
    std::fs::create_dir_all(&slides).unwrap();

    std::fs::write(pdf.join("docker.pdf"), b"%PDF-1.4 docker slides").unwrap();

    let deck: Vec<String> = notes
        .iter()
        .enumerate()
        .map(|(i, note)| format!("# Slide {i}\n\nNotes :\n{note}"))
        .collect();
    std::fs::write(slides.join("01.md"), deck.join("\n\n\n\n")).unwrap();
    std::fs::write(slides.join("slides.json"), r#"["01.md"]"#).unwrap();

    PresentationConfig {
        file: pdf.join("docker.pdf"),
        notes_source: slides.join("slides.json"),
    }
}

fn full_config(root: &Path) -> ClassConfig {
    let script = root.join("setup.sh");
    std::fs::write(&script, "#!/bin/bash\n# local setup\napt-get update\n").unwrap();

    let mut lab = resource("lab");
    lab.init_scripts = vec![
        ScriptRef::Fragment(FragmentRef::new("docker.sh").with_env("DOCKER_VERSION", "24.0")),
        ScriptRef::File(script),
    ];
    lab.post_launch_scripts = vec![ScriptRef::Fragment(FragmentRef::new("motd.sh"))];
    lab.webview_links = vec![WebviewLink {
        name: String::from("IDE"),
        url: String::from("http://{{ .IP }}:8080"),
    }];

    let mut config = ClassConfig::new("Docker Fundamentals");
    config.description = vec![String::from("Three days"), String::from("Hands-on")];
    config.labels = BTreeSet::from([String::from("docker"), String::from("containers")]);
    config.presentations = vec![write_material(root, &["Welcome", "Images"])];
    config.resources = vec![lab, resource("registry")];
    config
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_apply_then_plan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeApi::default();
    let reconciler = reconciler(&api);
    let mut config = full_config(dir.path());

    let plan = reconciler.plan(&config).await.unwrap();
    assert_eq!(
        plan.action_types(),
        vec![
            ActionType::CreateClass,
            ActionType::CreatePresentation,
            ActionType::CreateNotes,
            ActionType::CreateResource,
            ActionType::CreateResource,
        ]
    );

    let result = reconciler.apply_plan(&plan).await.unwrap();
    assert!(result.class_created);
    assert_eq!(result.created, 3);
    assert_eq!(result.notes, 1);

    config.id.clone_from(&result.class_id);
    let plan = reconciler.plan(&config).await.unwrap();
    assert!(plan.is_empty(), "unexpected actions: {plan}");

    let class = api.class(result.class_id.as_deref().unwrap());
    let lab = &class.resources[0];
    let userdata = lab.userdata.as_deref().unwrap();
    assert!(userdata.starts_with("#!/bin/bash\n"));
    assert!(userdata.contains("DOCKER_VERSION='24.0'"));
    assert!(userdata.contains("echo \"--------- Start docker.sh\""));
    assert!(!userdata.contains("# local setup"));
    assert!(class.resources[1].userdata.is_none());
}

#[tokio::test]
async fn test_relative_paths_resolve_against_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_material(dir.path(), &["Welcome"]);
    std::fs::write(dir.path().join("setup.sh"), "apt-get update\n").unwrap();

    let mut lab = resource("lab");
    lab.init_scripts = vec![ScriptRef::File(PathBuf::from("setup.sh"))];
    let mut config = ClassConfig::new("Docker");
    config.presentations = vec![PresentationConfig {
        file: PathBuf::from("PDF/docker.pdf"),
        notes_source: PathBuf::from("Slides/slides.json"),
    }];
    config.resources = vec![lab];

    let api = FakeApi::default();
    let reconciler = reconciler(&api).with_base_dir(dir.path());

    let result = reconciler.apply(&config).await.unwrap();
    assert!(result.class_created);
    assert_eq!(result.created, 2);
    assert_eq!(result.notes, 1);

    let class = api.class(result.class_id.as_deref().unwrap());
    let userdata = class.resources[0].userdata.as_deref().unwrap();
    assert!(userdata.contains("echo \"--------- Start setup.sh\""));

    config.id.clone_from(&result.class_id);
    let plan = reconciler.plan(&config).await.unwrap();
    assert!(plan.is_empty(), "unexpected actions: {plan}");
}

#[tokio::test]
async fn test_positional_resource_matching() {
    let api = FakeApi::with_class(remote_class(
        "Docker",
        vec![remote_resource("r1", "A"), remote_resource("r2", "B")],
    ));
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    config.id = Some(String::from("c1"));
    config.resources = vec![resource("A'")];

    let plan = reconciler.plan(&config).await.unwrap();
    assert_eq!(
        plan.action_types(),
        vec![ActionType::UpdateResource, ActionType::DeleteResource]
    );
    assert!(matches!(
        &plan.actions[0].operation,
        Operation::UpdateResource { resource_id, request } if resource_id == "r1" && request.name == "A'"
    ));
    assert!(matches!(
        &plan.actions[1].operation,
        Operation::DeleteResource { resource_id, .. } if resource_id == "r2"
    ));

    reconciler.apply_plan(&plan).await.unwrap();
    let class = api.class("c1");
    assert_eq!(class.resources.len(), 1);
    assert_eq!(class.resources[0].id, "r1");
    assert_eq!(class.resources[0].name, "A'");
    assert!(reconciler.plan(&config).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_class_rename_and_resource_removal() {
    let api = FakeApi::with_class(remote_class("A", vec![remote_resource("x", "lab")]));
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("B");
    config.id = Some(String::from("c1"));

    let plan = reconciler.plan(&config).await.unwrap();
    assert_eq!(
        plan.action_types(),
        vec![ActionType::UpdateClass, ActionType::DeleteResource]
    );
    assert_eq!(plan.actions[0].changes[0].field, "name");

    reconciler.apply_plan(&plan).await.unwrap();
    assert_eq!(api.calls(), vec!["update_class", "delete_resource"]);
    assert!(reconciler.check_drift(&config).await.unwrap().is_converged());
}

#[tokio::test]
async fn test_changed_notes_only_recreate_notes() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeApi::default();
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    config.presentations = vec![write_material(dir.path(), &["Welcome", "Images"])];
    let result = reconciler.apply(&config).await.unwrap();
    config.id.clone_from(&result.class_id);

    write_material(dir.path(), &["Welcome", "Images and layers"]);
    let plan = reconciler.plan(&config).await.unwrap();
    assert_eq!(plan.action_types(), vec![ActionType::CreateNotes]);
    let Operation::CreateNotes { target, notes } = &plan.actions[0].operation else {
        panic!("expected notes");
    };
    assert!(matches!(target, NotesTarget::Existing { .. }));
    assert_eq!(
        notes[1],
        Note {
            page: 2,
            content: String::from("Images and layers")
        }
    );

    let report = reconciler.check_drift(&config).await.unwrap();
    assert!(report.has_drift);
    assert_eq!(report.drifted.len(), 1);
}

#[tokio::test]
async fn test_changed_presentation_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeApi::default();
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    config.presentations = vec![write_material(dir.path(), &["Welcome"])];
    let result = reconciler.apply(&config).await.unwrap();
    config.id.clone_from(&result.class_id);

    // Same size, different content
    std::fs::write(dir.path().join("PDF/docker.pdf"), b"%PDF-1.4 DOCKER slides").unwrap();
    let plan = reconciler.plan(&config).await.unwrap();
    assert_eq!(
        plan.action_types(),
        vec![ActionType::UpdatePresentation, ActionType::CreateNotes]
    );
    assert_eq!(plan.actions[0].changes[0].field, "md5");

    reconciler.apply_plan(&plan).await.unwrap();
    assert!(reconciler.plan(&config).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_scripts_match_null_and_empty_remote() {
    let mut with_empty = remote_resource("r2", "empty");
    with_empty.userdata = Some(String::new());
    with_empty.post_launch_script = Some(String::from("\n"));
    let api = FakeApi::with_class(remote_class(
        "Docker",
        vec![remote_resource("r1", "null"), with_empty],
    ));
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    config.id = Some(String::from("c1"));
    config.resources = vec![resource("null"), resource("empty")];

    assert!(reconciler.plan(&config).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_image_round_trip_through_platform() {
    let api = FakeApi::default();
    let reconciler = reconciler(&api);

    let mut custom = resource("custom");
    custom.image = ImageSpec::Custom(strigo_sync::config::CustomImage {
        image_id: String::from("ami-123"),
        image_user: String::from("centos"),
        ec2_region: String::from("eu-west-1"),
        region_mapping: [(String::from("us-east-1"), String::from("ami-456"))].into(),
        is_windows: false,
    });
    let mut config = ClassConfig::new("Images");
    config.resources = vec![resource("named"), custom.clone()];

    let result = reconciler.apply(&config).await.unwrap();
    let class = api.class(result.class_id.as_deref().unwrap());

    assert_eq!(ImageCatalog::from_remote(&class.resources[0]), config.resources[0].image);
    assert_eq!(ImageCatalog::from_remote(&class.resources[1]), custom.image);
}

#[tokio::test]
async fn test_failure_aborts_without_rollback() {
    let api = FakeApi::default();
    api.fail_on("create_resource");
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    config.resources = vec![resource("lab"), resource("registry")];

    let err = reconciler.apply(&config).await.unwrap_err();
    assert!(matches!(err, SyncError::Api(ApiError::Transport { status: 500, .. })));
    assert_eq!(api.calls(), vec!["create_class", "create_resource"]);
    assert_eq!(api.platform.lock().unwrap().classes.len(), 1);
}

#[tokio::test]
async fn test_retry_after_failure_reuses_created_class() {
    let api = FakeApi::default();
    api.fail_on("create_resource");
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    config.resources = vec![resource("lab")];

    let plan = reconciler.plan(&config).await.unwrap();
    let failure = reconciler.apply_plan(&plan).await.unwrap_err();
    assert!(failure.class_created());
    assert_eq!(failure.applied.len(), 1);
    assert!(matches!(failure.error, SyncError::Api(ApiError::Transport { status: 500, .. })));
    config.id.clone_from(&failure.class_id);
    assert!(config.id.is_some());

    api.recover();
    let result = reconciler.apply(&config).await.unwrap();
    assert!(!result.class_created);
    assert_eq!(result.created, 1);
    assert_eq!(result.class_id, config.id);
    assert_eq!(api.platform.lock().unwrap().classes.len(), 1);
}

#[tokio::test]
async fn test_unknown_image_suggests_custom_image() {
    let api = FakeApi::default();
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    let mut lab = resource("lab");
    lab.image = ImageSpec::Named(String::from("plan9"));
    config.resources = vec![lab];

    let message = reconciler.plan(&config).await.unwrap_err().to_string();
    assert!(message.contains("Unknown image name: plan9"));
    assert!(message.contains("ubuntu-20.04"));
    assert!(message.contains("image_id: <ami_id>"));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_class_id_plans_creation() {
    let api = FakeApi::default();
    let reconciler = reconciler(&api);

    let snapshot = reconciler.fetch_snapshot(Some("gone")).await.unwrap();
    assert!(snapshot.class.is_none());

    let mut config = ClassConfig::new("Docker");
    config.id = Some(String::from("gone"));
    let plan = reconciler
        .plan_against(&config, &RemoteSnapshot::empty())
        .await
        .unwrap();
    assert_eq!(plan.action_types(), vec![ActionType::CreateClass]);
    assert_eq!(plan.warnings.len(), 1);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_before_remote_calls() {
    let api = FakeApi::default();
    let reconciler = reconciler(&api);

    let mut config = ClassConfig::new("Docker");
    config.resources = vec![resource("lab"), resource("lab")];

    assert!(reconciler.apply(&config).await.is_err());
    assert!(api.calls().is_empty());
}
