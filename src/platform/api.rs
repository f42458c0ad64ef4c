//! Remote API capability consumed by the reconciler.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::client::StrigoClient;
use super::types::{Class, ClassRequest, Note, NotesRequest, Presentation, Resource, ResourceRequest};
use crate::error::Result;

/// Operations the reconciler needs from the training platform.
///
/// Every call is a single request; implementations must not retry.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Lists every class of the organization.
    async fn list_classes(&self) -> Result<Vec<Class>>;

    /// Gets a class by id.
    async fn get_class(&self, class_id: &str) -> Result<Class>;

    /// Creates a class.
    async fn create_class(&self, request: &ClassRequest) -> Result<Class>;

    /// Updates class metadata.
    async fn update_class(&self, class_id: &str, request: &ClassRequest) -> Result<Class>;

    /// Deletes a class.
    async fn delete_class(&self, class_id: &str) -> Result<()>;

    /// Lists the presentations of a class.
    async fn list_presentations(&self, class_id: &str) -> Result<Vec<Presentation>>;

    /// Gets a presentation by id.
    async fn get_presentation(&self, class_id: &str, presentation_id: &str)
    -> Result<Presentation>;

    /// Uploads a presentation file.
    async fn create_presentation(&self, class_id: &str, file: &Path) -> Result<Presentation>;

    /// Deletes a presentation.
    async fn delete_presentation(&self, class_id: &str, presentation_id: &str) -> Result<()>;

    /// Replaces a presentation: the platform has no in-place update, so the
    /// old upload is deleted before the new file is uploaded.
    async fn update_presentation(
        &self,
        class_id: &str,
        presentation_id: &str,
        file: &Path,
    ) -> Result<Presentation> {
        self.delete_presentation(class_id, presentation_id).await?;
        self.create_presentation(class_id, file).await
    }

    /// Gets the notes of a presentation.
    async fn get_notes(&self, class_id: &str, presentation_id: &str) -> Result<Vec<Note>>;

    /// Sets the notes of a presentation.
    async fn create_notes(&self, class_id: &str, presentation_id: &str, notes: &[Note])
    -> Result<()>;

    /// Deletes every note of a presentation.
    async fn delete_notes(&self, class_id: &str, presentation_id: &str) -> Result<()>;

    /// Lists the resources of a class.
    async fn list_resources(&self, class_id: &str) -> Result<Vec<Resource>>;

    /// Gets a resource by id.
    async fn get_resource(&self, class_id: &str, resource_id: &str) -> Result<Resource>;

    /// Creates a resource.
    async fn create_resource(&self, class_id: &str, request: &ResourceRequest) -> Result<Resource>;

    /// Updates a resource.
    async fn update_resource(
        &self,
        class_id: &str,
        resource_id: &str,
        request: &ResourceRequest,
    ) -> Result<Resource>;

    /// Deletes a resource.
    async fn delete_resource(&self, class_id: &str, resource_id: &str) -> Result<()>;

    /// Finds classes by exact name.
    async fn search_classes(&self, name: &str) -> Result<Vec<Class>> {
        let classes = self.list_classes().await?;
        Ok(classes.into_iter().filter(|c| c.name == name).collect())
    }
}

#[async_trait]
impl RemoteApi for StrigoClient {
    async fn list_classes(&self) -> Result<Vec<Class>> {
        self.get("/classes").await
    }

    async fn get_class(&self, class_id: &str) -> Result<Class> {
        self.get(&format!("/classes/{class_id}")).await
    }

    async fn create_class(&self, request: &ClassRequest) -> Result<Class> {
        debug!("Creating class {}", request.name);
        self.post("/classes", request).await
    }

    async fn update_class(&self, class_id: &str, request: &ClassRequest) -> Result<Class> {
        debug!("Updating class {class_id}");
        self.patch(&format!("/classes/{class_id}"), request).await
    }

    async fn delete_class(&self, class_id: &str) -> Result<()> {
        debug!("Deleting class {class_id}");
        self.delete(&format!("/classes/{class_id}")).await
    }

    async fn list_presentations(&self, class_id: &str) -> Result<Vec<Presentation>> {
        self.get(&format!("/classes/{class_id}/presentations")).await
    }

    async fn get_presentation(
        &self,
        class_id: &str,
        presentation_id: &str,
    ) -> Result<Presentation> {
        self.get(&format!("/classes/{class_id}/presentations/{presentation_id}"))
            .await
    }

    async fn create_presentation(&self, class_id: &str, file: &Path) -> Result<Presentation> {
        self.upload(
            &format!("/classes/{class_id}/presentations"),
            "presentation",
            file,
        )
        .await
    }

    async fn delete_presentation(&self, class_id: &str, presentation_id: &str) -> Result<()> {
        debug!("Deleting presentation {presentation_id}");
        self.delete(&format!("/classes/{class_id}/presentations/{presentation_id}"))
            .await
    }

    async fn get_notes(&self, class_id: &str, presentation_id: &str) -> Result<Vec<Note>> {
        self.get(&format!(
            "/classes/{class_id}/presentations/{presentation_id}/notes"
        ))
        .await
    }

    async fn create_notes(
        &self,
        class_id: &str,
        presentation_id: &str,
        notes: &[Note],
    ) -> Result<()> {
        debug!("Sending {} notes for presentation {presentation_id}", notes.len());
        let _: serde_json::Value = self
            .post(
                &format!("/classes/{class_id}/presentations/{presentation_id}/notes"),
                &NotesRequest { notes },
            )
            .await?;
        Ok(())
    }

    async fn delete_notes(&self, class_id: &str, presentation_id: &str) -> Result<()> {
        self.delete(&format!(
            "/classes/{class_id}/presentations/{presentation_id}/notes"
        ))
        .await
    }

    async fn list_resources(&self, class_id: &str) -> Result<Vec<Resource>> {
        self.get(&format!("/classes/{class_id}/resources")).await
    }

    async fn get_resource(&self, class_id: &str, resource_id: &str) -> Result<Resource> {
        self.get(&format!("/classes/{class_id}/resources/{resource_id}"))
            .await
    }

    async fn create_resource(&self, class_id: &str, request: &ResourceRequest) -> Result<Resource> {
        debug!("Creating resource {}", request.name);
        self.post(&format!("/classes/{class_id}/resources"), request)
            .await
    }

    async fn update_resource(
        &self,
        class_id: &str,
        resource_id: &str,
        request: &ResourceRequest,
    ) -> Result<Resource> {
        debug!("Updating resource {resource_id}");
        self.patch(&format!("/classes/{class_id}/resources/{resource_id}"), request)
            .await
    }

    async fn delete_resource(&self, class_id: &str, resource_id: &str) -> Result<()> {
        debug!("Deleting resource {resource_id}");
        self.delete(&format!("/classes/{class_id}/resources/{resource_id}"))
            .await
    }
}
