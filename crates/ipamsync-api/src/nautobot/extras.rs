// Nautobot extras: tags and per-object notes

use uuid::Uuid;

use super::client::NautobotClient;
use super::models::{Note, NoteWrite, Page, Tag, TagWrite};
use crate::error::Error;

impl NautobotClient {
    pub async fn find_tag(&self, name: &str) -> Result<Option<Tag>, Error> {
        let page: Page<Tag> = self
            .get_with_params("extras/tags/", &[("name", name.to_owned())])
            .await?;
        Ok(page.results.into_iter().next())
    }

    pub async fn create_tag(&self, body: &TagWrite) -> Result<Tag, Error> {
        self.post("extras/tags/", body).await
    }

    /// Look a tag up by name, creating it when missing.
    pub async fn ensure_tag(&self, body: &TagWrite) -> Result<Tag, Error> {
        match self.find_tag(&body.name).await? {
            Some(tag) => Ok(tag),
            None => self.create_tag(body).await,
        }
    }

    /// Attach a note to an object. `resource` is the collection path,
    /// e.g. `"ipam/prefixes"`.
    pub async fn add_note(&self, resource: &str, id: &Uuid, note: &str) -> Result<Note, Error> {
        self.post(
            &format!("{resource}/{id}/notes/"),
            &NoteWrite {
                note: note.to_owned(),
            },
        )
        .await
    }
}
