//! Mail folders and messages
//!
//! The adapter knows what a folder and a message are; how they are stored
//! is up to a [`MailStore`]. Folder entities enumerate their messages
//! first, then their sub-folders. Message entities are leaves.

use crate::crawler::{log_skip, ChildStream, CrawlContext, DiscoveryChannel, DiscoverySender};
use crate::source::{ContentStream, IdentityStability, Materialized, SourceAdapter};
use crate::state::{Attributes, DataEntity, SourceKind};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::sync::Arc;

const ATTR_ROLE: &str = "mail.role";
const ATTR_FOLDER: &str = "mail.folder";
const ATTR_MESSAGE: &str = "mail.message";
const ATTR_FLAGS: &str = "mail.flags";
const ROLE_MESSAGE: &str = "message";

/// What a folder can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderType {
    Messages,
    Folders,
    MessagesAndFolders,
}

impl FolderType {
    pub fn holds_messages(&self) -> bool {
        matches!(self, Self::Messages | Self::MessagesAndFolders)
    }

    /// Whether the folder supports sub-containers
    pub fn holds_folders(&self) -> bool {
        matches!(self, Self::Folders | Self::MessagesAndFolders)
    }
}

/// Per-message status flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFlags {
    pub seen: bool,
    pub answered: bool,
    pub flagged: bool,
    pub draft: bool,
    /// Marked for deletion; never crawled
    pub deleted: bool,
}

impl MessageFlags {
    /// Compact `SRFDT`-style rendering for metadata
    pub fn to_letters(&self) -> String {
        [
            (self.draft, 'D'),
            (self.flagged, 'F'),
            (self.answered, 'R'),
            (self.seen, 'S'),
            (self.deleted, 'T'),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, c)| *c)
        .collect()
    }
}

/// One message as listed by a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Store-assigned key, unique within the folder
    pub key: String,
    pub flags: MessageFlags,
    /// Content identity marker; empty when the store cannot tell
    pub fingerprint: String,
    /// The message disappeared after it was listed
    pub expunged: bool,
}

/// Access to a mail store
///
/// Calls are blocking; the adapter runs them off the async runtime.
/// Folder references are opaque strings handed out by the store itself.
pub trait MailStore: Send + Sync {
    fn folder_type(&self, folder: &str) -> Result<FolderType>;

    fn list_messages(&self, folder: &str) -> Result<Vec<MessageInfo>>;

    fn list_subfolders(&self, folder: &str) -> Result<Vec<String>>;

    /// Reads the raw RFC 822 bytes of a message
    fn read_message(&self, folder: &str, key: &str) -> Result<Vec<u8>>;

    /// Whether message keys stay valid across sessions
    fn ids_are_stable(&self) -> bool;
}

/// Adapter over any [`MailStore`]
pub struct MailboxAdapter {
    store: Arc<dyn MailStore>,
}

impl MailboxAdapter {
    pub fn new(store: Arc<dyn MailStore>) -> Self {
        Self { store }
    }

    /// Builds the root entity for a top-level folder reference
    pub fn root_entity(folder: impl Into<String>) -> DataEntity {
        let folder = folder.into();
        DataEntity::root(SourceKind::Mailbox, folder.clone()).with_attribute(ATTR_FOLDER, folder)
    }

    fn is_message(entity: &DataEntity) -> bool {
        entity.attributes.get(ATTR_ROLE) == Some(ROLE_MESSAGE)
    }

    fn folder_ref(entity: &DataEntity) -> &str {
        entity
            .attributes
            .get(ATTR_FOLDER)
            .unwrap_or(entity.source_id.as_str())
    }

    fn list_folder(
        store: &dyn MailStore,
        folder: &DataEntity,
        verbose: bool,
        tx: &DiscoverySender,
    ) -> Result<()> {
        let folder_ref = Self::folder_ref(folder).to_string();
        let folder_type = store.folder_type(&folder_ref)?;

        if folder_type.holds_messages() {
            for info in store.list_messages(&folder_ref)? {
                let id = format!("{}/{}", folder.source_id, info.key);
                if info.flags.deleted {
                    log_skip(verbose, &id, "message marked deleted");
                    continue;
                }
                if info.expunged {
                    log_skip(verbose, &id, "message expunged");
                    continue;
                }
                let child = DataEntity::child_of(folder, SourceKind::Mailbox, id)
                    .with_fingerprint(info.fingerprint)
                    .with_attribute(ATTR_ROLE, ROLE_MESSAGE)
                    .with_attribute(ATTR_FOLDER, folder_ref.clone())
                    .with_attribute(ATTR_MESSAGE, info.key)
                    .with_attribute(ATTR_FLAGS, info.flags.to_letters());
                if !tx.offer(child) {
                    return Ok(());
                }
            }
        }

        if folder_type.holds_folders() {
            for sub in store.list_subfolders(&folder_ref)? {
                let child = DataEntity::child_of(folder, SourceKind::Mailbox, sub.clone())
                    .with_attribute(ATTR_FOLDER, sub);
                if !tx.offer(child) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for MailboxAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Mailbox
    }

    fn identity(&self) -> IdentityStability {
        if self.store.ids_are_stable() {
            IdentityStability::Stable
        } else {
            IdentityStability::Unstable
        }
    }

    async fn discover_children(
        &self,
        entity: &DataEntity,
        _retained: Option<&str>,
        ctx: &CrawlContext,
    ) -> Result<ChildStream> {
        if Self::is_message(entity) {
            return Ok(ChildStream::empty());
        }

        let store = self.store.clone();
        let folder = entity.clone();
        let verbose = ctx.verbose;
        Ok(DiscoveryChannel::spawn(
            entity.source_id.clone(),
            ctx.cancellation.clone(),
            move |tx| Self::list_folder(store.as_ref(), &folder, verbose, tx),
        ))
    }

    async fn materialize(&self, entity: &DataEntity) -> Result<Materialized> {
        if !Self::is_message(entity) {
            return Ok(Materialized::none());
        }

        let folder = Self::folder_ref(entity).to_string();
        let key = entity
            .attributes
            .get(ATTR_MESSAGE)
            .ok_or_else(|| CrawlError::format(&entity.source_id, "message key missing"))?
            .to_string();

        let store = self.store.clone();
        let raw = tokio::task::spawn_blocking(move || store.read_message(&folder, &key))
            .await
            .map_err(|e| CrawlError::format(&entity.source_id, format!("message reader failed: {}", e)))??;

        let metadata = header_metadata(&raw);
        Ok(Materialized::content(
            ContentStream::from_bytes(raw).with_mime_type("message/rfc822"),
            metadata,
        ))
    }
}

/// Extracts the headers the crawl records from a raw message
fn header_metadata(raw: &[u8]) -> Attributes {
    let text = String::from_utf8_lossy(raw);
    let mut attrs = Attributes::new();
    for (name, key) in [
        ("subject", "mail.subject"),
        ("from", "mail.from"),
        ("message-id", "mail.message-id"),
    ] {
        if let Some(value) = header_value(&text, name) {
            attrs.insert(key, value);
        }
    }
    attrs
}

/// First value of header `name`, with folded continuation lines joined
fn header_value(message: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for line in message.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some(current) = value.as_mut() {
            if line.starts_with(' ') || line.starts_with('\t') {
                current.push(' ');
                current.push_str(line.trim());
                continue;
            }
            break;
        }
        if let Some((field, rest)) = line.split_once(':') {
            if field.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{ContentHandlerFactory, CrawlEngine};
    use crate::output::MemorySink;
    use crate::source::AdapterRegistry;
    use crate::state::ModificationState;
    use crate::tracker::MemoryChangeTracker;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Store whose keys are reassigned every session, like sequence numbers
    struct SessionStore {
        folders: HashMap<String, (FolderType, Vec<(MessageInfo, Vec<u8>)>, Vec<String>)>,
        reads: Mutex<Vec<String>>,
    }

    impl SessionStore {
        fn single(messages: Vec<(&str, &str, &str)>) -> Self {
            let listed = messages
                .into_iter()
                .map(|(key, fingerprint, body)| {
                    (
                        MessageInfo {
                            key: key.to_string(),
                            flags: MessageFlags::default(),
                            fingerprint: fingerprint.to_string(),
                            expunged: false,
                        },
                        body.as_bytes().to_vec(),
                    )
                })
                .collect();
            let mut folders = HashMap::new();
            folders.insert("INBOX".to_string(), (FolderType::Messages, listed, Vec::new()));
            Self {
                folders,
                reads: Mutex::new(Vec::new()),
            }
        }

        fn folder(&self, folder: &str) -> Result<&(FolderType, Vec<(MessageInfo, Vec<u8>)>, Vec<String>)> {
            self.folders
                .get(folder)
                .ok_or_else(|| CrawlError::format(folder, "no such folder"))
        }
    }

    impl MailStore for SessionStore {
        fn folder_type(&self, folder: &str) -> Result<FolderType> {
            Ok(self.folder(folder)?.0)
        }

        fn list_messages(&self, folder: &str) -> Result<Vec<MessageInfo>> {
            Ok(self.folder(folder)?.1.iter().map(|(info, _)| info.clone()).collect())
        }

        fn list_subfolders(&self, folder: &str) -> Result<Vec<String>> {
            Ok(self.folder(folder)?.2.clone())
        }

        fn read_message(&self, folder: &str, key: &str) -> Result<Vec<u8>> {
            self.reads.lock().unwrap().push(key.to_string());
            self.folder(folder)?
                .1
                .iter()
                .find(|(info, _)| info.key == key)
                .map(|(_, body)| body.clone())
                .ok_or_else(|| CrawlError::format(key, "no such message"))
        }

        fn ids_are_stable(&self) -> bool {
            false
        }
    }

    async fn crawl(store: Arc<SessionStore>, tracker: Arc<MemoryChangeTracker>) -> Arc<MemorySink> {
        let registry = AdapterRegistry::new().with(Arc::new(MailboxAdapter::new(store)));
        let engine = CrawlEngine::new(registry, tracker);
        let sink = Arc::new(MemorySink::new());
        let ctx = CrawlContext::new(ContentHandlerFactory::shared(sink.clone()));
        engine
            .run(MailboxAdapter::root_entity("INBOX"), &ctx)
            .await
            .unwrap();
        sink
    }

    #[test]
    fn test_header_value_unfolds_continuations() {
        let message = "Subject: a long\r\n  subject line\r\nFrom: Ann <ann@example.com>\r\n\r\nSubject: body\r\n";
        assert_eq!(
            header_value(message, "subject").as_deref(),
            Some("a long subject line")
        );
        assert_eq!(
            header_value(message, "FROM").as_deref(),
            Some("Ann <ann@example.com>")
        );
        assert_eq!(header_value(message, "message-id"), None);
    }

    #[test]
    fn test_flag_letters() {
        let flags = MessageFlags {
            seen: true,
            flagged: true,
            ..MessageFlags::default()
        };
        assert_eq!(flags.to_letters(), "FS");
    }

    #[tokio::test]
    async fn test_unstable_keys_track_by_fingerprint() {
        let tracker = Arc::new(MemoryChangeTracker::new());
        let first = Arc::new(SessionStore::single(vec![
            ("1", "<a@example.com>", "Subject: A\r\n\r\nbody a"),
            ("2", "<b@example.com>", "Subject: B\r\n\r\nbody b"),
        ]));
        let sink = crawl(first, tracker.clone()).await;
        assert_eq!(sink.find("INBOX/1").unwrap().entity.attributes.get("mail.subject"), Some("A"));

        // Next session: message 1 was removed and keys shifted down.
        let second = Arc::new(SessionStore::single(vec![
            ("1", "<b@example.com>", "Subject: B\r\n\r\nbody b"),
            ("2", "<c@example.com>", "Subject: C\r\n\r\nbody c"),
        ]));
        let sink = crawl(second.clone(), tracker).await;

        assert!(sink.find("INBOX/1").is_none());
        let new = sink.find("INBOX/2").unwrap();
        assert_eq!(new.entity.modification_state, ModificationState::New);
        assert_eq!(new.entity.attributes.get("mail.subject"), Some("C"));
        assert_eq!(*second.reads.lock().unwrap(), vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_deleted_and_expunged_messages_are_skipped() {
        let mut store = SessionStore::single(vec![("1", "f1", "Subject: keep\r\n\r\n")]);
        let inbox = store.folders.get_mut("INBOX").unwrap();
        inbox.0 = FolderType::MessagesAndFolders;
        inbox.1.push((
            MessageInfo {
                key: "2".to_string(),
                flags: MessageFlags {
                    deleted: true,
                    ..MessageFlags::default()
                },
                fingerprint: "f2".to_string(),
                expunged: false,
            },
            Vec::new(),
        ));
        inbox.1.push((
            MessageInfo {
                key: "3".to_string(),
                flags: MessageFlags::default(),
                fingerprint: "f3".to_string(),
                expunged: true,
            },
            Vec::new(),
        ));
        inbox.2.push("Archive".to_string());
        store
            .folders
            .insert("Archive".to_string(), (FolderType::Messages, Vec::new(), Vec::new()));

        let sink = crawl(Arc::new(store), Arc::new(MemoryChangeTracker::new())).await;
        let ids: Vec<String> = sink.records().into_iter().map(|r| r.entity.source_id).collect();
        assert_eq!(ids, vec!["INBOX", "INBOX/1", "Archive"]);

        let message = sink.find("INBOX/1").unwrap();
        assert_eq!(message.entity.parent_id.as_deref(), Some("INBOX"));
        assert!(message.content.is_some());
        assert!(sink.find("INBOX").unwrap().content.is_none());
    }

    #[tokio::test]
    async fn test_message_only_folder_does_not_list_subfolders() {
        let mut store = SessionStore::single(Vec::new());
        store.folders.get_mut("INBOX").unwrap().2.push("Hidden".to_string());

        let sink = crawl(Arc::new(store), Arc::new(MemoryChangeTracker::new())).await;
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.error_count(), 0);
    }
}
