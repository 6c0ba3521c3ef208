use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use super::{Result, Storage, StorageError};
use crate::agent::{Conversation, ConversationSummary, Message};

/// One JSON document per conversation under `base_path`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.base_path).await
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn write(&self, conversation: &Conversation) -> Result<()> {
        let json = serde_json::to_string(conversation)?;
        let path = self.conversation_path(&conversation.id);
        // Write then rename so a crash never leaves a truncated document behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let path = self.conversation_path(conversation_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn conversation_path(&self, conversation_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", conversation_id))
    }
}

#[async_trait::async_trait]
impl Storage for FileStorage {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        let conversation = Conversation::new(Uuid::new_v4().to_string(), title);
        self.write(&conversation).await?;
        log::debug!(
            "[{}] Created conversation '{}'",
            conversation.id,
            conversation.title
        );
        Ok(conversation)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Conversation>(&content) {
                Ok(conversation) => summaries.push(conversation.summary()),
                Err(error) => {
                    log::warn!("Skipping unreadable conversation file {:?}: {}", path, error);
                }
            }
        }

        summaries.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        Ok(summaries)
    }

    async fn load_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.read(conversation_id).await
    }

    async fn save_messages(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        let mut conversation = self
            .read(conversation_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(conversation_id.to_string()))?;

        conversation.replace_messages(messages.to_vec());
        self.write(&conversation).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        match fs::remove_file(self.conversation_path(conversation_id)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DEFAULT_CONVERSATION_TITLE;
    use tokio_test::{assert_err, assert_ok};

    async fn create_temp_storage() -> (FileStorage, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let storage = FileStorage::new(temp_dir.path().join("conversations"));
        storage.init().await.expect("init storage");
        (storage, temp_dir)
    }

    #[tokio::test]
    async fn create_then_load_round_trips() {
        let (storage, _dir) = create_temp_storage().await;

        let created = assert_ok!(storage.create_conversation(None).await);
        assert_eq!(created.title, DEFAULT_CONVERSATION_TITLE);

        let loaded = assert_ok!(storage.load_conversation(&created.id).await).unwrap();
        assert_eq!(loaded.id, created.id);
        assert!(loaded.messages.is_empty());
    }

    #[tokio::test]
    async fn load_unknown_conversation_is_none() {
        let (storage, _dir) = create_temp_storage().await;

        assert!(assert_ok!(storage.load_conversation("missing").await).is_none());
    }

    #[tokio::test]
    async fn save_messages_replaces_history_and_bumps_updated_at() {
        let (storage, _dir) = create_temp_storage().await;
        let created = storage.create_conversation(Some("Users".into())).await.unwrap();

        let history = vec![Message::user("delete user 42"), Message::assistant("Done.", None)];
        assert_ok!(storage.save_messages(&created.id, &history).await);

        let loaded = storage.load_conversation(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[1].text(), "Done.");
        assert!(loaded.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn save_messages_on_unknown_conversation_fails() {
        let (storage, _dir) = create_temp_storage().await;

        let error = assert_err!(storage.save_messages("missing", &[]).await);
        assert!(matches!(error, StorageError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn list_orders_by_most_recent_update() {
        let (storage, _dir) = create_temp_storage().await;
        let older = storage.create_conversation(Some("older".into())).await.unwrap();
        let newer = storage.create_conversation(Some("newer".into())).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage
            .save_messages(&older.id, &[Message::user("bump")])
            .await
            .unwrap();

        let summaries = storage.list_conversations().await.unwrap();
        let titles: Vec<_> = summaries.iter().map(|s| s.title.as_str()).collect();

        assert_eq!(titles, vec!["older", "newer"]);
        assert_eq!(summaries[0].message_count, 1);
        assert_eq!(summaries[1].id, newer.id);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let (storage, _dir) = create_temp_storage().await;
        let created = storage.create_conversation(None).await.unwrap();

        assert!(storage.delete_conversation(&created.id).await.unwrap());
        assert!(!storage.delete_conversation(&created.id).await.unwrap());
        assert!(storage.load_conversation(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_on_missing_directory_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("never-created"));

        assert!(storage.list_conversations().await.unwrap().is_empty());
    }
}
