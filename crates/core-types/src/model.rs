use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

/// Literal subject that matches every other subject.
pub const SUBJECT_WILDCARD: &str = "*";
/// Separator between a subject type and an instance id (`Project|p-1`).
pub const SUBJECT_INSTANCE_SEPARATOR: char = '|';

/// Verb a caller wants to perform.
///
/// `Any` is the "any action" marker: a permission carrying it matches every
/// requested action.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    #[serde(rename = "*", alias = "MANAGE")]
    Any,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Read => "READ",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Any => "*",
        }
    }

    /// Whether a permission granted for `self` covers a request for `requested`.
    pub fn covers(self, requested: Action) -> bool {
        self == Action::Any || self == requested
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Action::Create),
            "READ" => Ok(Action::Read),
            "UPDATE" => Ok(Action::Update),
            "DELETE" => Ok(Action::Delete),
            "*" | "MANAGE" => Ok(Action::Any),
            _ => Err(ParseError::Action(value.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "ALLOW",
            Effect::Deny => "DENY",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(Effect::Allow),
            "DENY" => Ok(Effect::Deny),
            _ => Err(ParseError::Effect(value.to_string())),
        }
    }
}

/// Resource type (optionally narrowed to one instance) being acted upon.
///
/// Forms:
/// - `*` matches every subject.
/// - `Type` names a whole resource type.
/// - `Type|id` names one instance; `Type|*` names every instance of `Type`.
///
/// Whitespace around the separator is dropped on construction, so
/// `"Group | g-1"` and `"Group|g-1"` are the same subject.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        match raw.split_once(SUBJECT_INSTANCE_SEPARATOR) {
            Some((kind, id)) => Self(format!(
                "{}{}{}",
                kind.trim(),
                SUBJECT_INSTANCE_SEPARATOR,
                id.trim()
            )),
            None => Self(raw.to_string()),
        }
    }

    pub fn wildcard() -> Self {
        Self(SUBJECT_WILDCARD.to_string())
    }

    pub fn instance(subject_type: impl AsRef<str>, id: impl AsRef<str>) -> Self {
        Self::new(format!(
            "{}{}{}",
            subject_type.as_ref(),
            SUBJECT_INSTANCE_SEPARATOR,
            id.as_ref()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == SUBJECT_WILDCARD
    }

    /// Type portion, i.e. everything before the instance separator.
    pub fn subject_type(&self) -> &str {
        match self.0.split_once(SUBJECT_INSTANCE_SEPARATOR) {
            Some((kind, _)) => kind,
            None => &self.0,
        }
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.0
            .split_once(SUBJECT_INSTANCE_SEPARATOR)
            .map(|(_, id)| id)
    }

    /// Whether a permission on `self` applies to a request on `requested`.
    pub fn matches(&self, requested: &Subject) -> bool {
        if self.is_wildcard() || self == requested {
            return true;
        }
        match self.instance_id() {
            Some(SUBJECT_WILDCARD) => self.subject_type() == requested.subject_type(),
            _ => false,
        }
    }
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        Subject::new(value)
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Subject::new(value)
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        value.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of work that needs authorization.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub action: Action,
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Operation {
    pub fn new(action: Action, subject: impl Into<Subject>) -> Self {
        Self {
            action,
            subject: subject.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}:{}:{}", self.action, self.subject, field),
            None => write!(f, "{}:{}", self.action, self.subject),
        }
    }
}

/// Parses `ACTION:Subject` or `ACTION:Subject:field`.
impl FromStr for Operation {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.splitn(3, ':');
        let (Some(action), Some(subject)) = (parts.next(), parts.next()) else {
            return Err(ParseError::Operation(value.to_string()));
        };
        if subject.trim().is_empty() {
            return Err(ParseError::Operation(value.to_string()));
        }
        let action = action.parse::<Action>()?;
        let mut operation = Operation::new(action, subject);
        if let Some(field) = parts.next().map(str::trim).filter(|f| !f.is_empty()) {
            operation = operation.with_field(field);
        }
        Ok(operation)
    }
}

/// A granted or denied rule over an action on a subject.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub effect: Effect,
    pub action: Action,
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Permission {
    pub fn new(effect: Effect, action: Action, subject: impl Into<Subject>) -> Self {
        Self {
            effect,
            action,
            subject: subject.into(),
            fields: None,
            reason: None,
        }
    }

    pub fn allow(action: Action, subject: impl Into<Subject>) -> Self {
        Self::new(Effect::Allow, action, subject)
    }

    pub fn deny(action: Action, subject: impl Into<Subject>) -> Self {
        Self::new(Effect::Deny, action, subject)
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_subject_wide(&self) -> bool {
        self.fields.is_none()
    }

    /// Field scoping: a subject-wide permission covers every field, a
    /// field-scoped one covers only its listed fields and never a
    /// whole-subject request.
    pub fn covers_field(&self, field: Option<&str>) -> bool {
        match (&self.fields, field) {
            (None, _) => true,
            (Some(fields), Some(field)) => fields.iter().any(|f| f == field),
            (Some(_), None) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdentityType {
    User,
    Group,
}

impl IdentityType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentityType::User => "USER",
            IdentityType::Group => "GROUP",
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityType {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(IdentityType::User),
            "GROUP" => Ok(IdentityType::Group),
            _ => Err(ParseError::IdentityType(value.to_string())),
        }
    }
}

/// Persisted permission attributed to a user or a group.
///
/// Records are immutable: an update is a delete followed by a create.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct IdentityPermission {
    pub identity_type: IdentityType,
    pub identity_id: String,
    pub effect: Effect,
    pub action: Action,
    pub subject_type: String,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IdentityPermission {
    pub fn new(
        identity_type: IdentityType,
        identity_id: impl Into<String>,
        effect: Effect,
        action: Action,
        subject_type: impl Into<String>,
        subject_id: impl Into<String>,
    ) -> Self {
        Self {
            identity_type,
            identity_id: identity_id.into(),
            effect,
            action,
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            fields: None,
            reason: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn key(&self) -> IdentityPermissionKey {
        IdentityPermissionKey::from(self)
    }

    pub fn subject(&self) -> Subject {
        Subject::instance(&self.subject_type, &self.subject_id)
    }

    /// Drops the identity framing; the subject keeps the instance id so a
    /// `*` id becomes `Type|*`.
    pub fn to_permission(&self) -> Permission {
        Permission {
            effect: self.effect,
            action: self.action,
            subject: self.subject(),
            fields: self.fields.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Composite key addressing one [`IdentityPermission`].
///
/// `partition` groups every record of one identity; `sort` identifies the
/// rule within it. Free-form components are length-prefixed so distinct rules
/// never share a key. Field order does not affect the key; `reason` is not
/// part of it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityPermissionKey {
    pub partition: String,
    pub sort: String,
}

impl IdentityPermissionKey {
    pub fn partition_for(identity_type: IdentityType, identity_id: &str) -> String {
        format!("{identity_type}#{identity_id}")
    }
}

fn push_component(out: &mut String, value: &str) {
    out.push_str(&value.len().to_string());
    out.push(':');
    out.push_str(value);
}

impl From<&IdentityPermission> for IdentityPermissionKey {
    fn from(record: &IdentityPermission) -> Self {
        let mut sort = String::new();
        push_component(&mut sort, &record.subject_type);
        sort.push('#');
        push_component(&mut sort, &record.subject_id);
        sort.push_str(&format!("#{}#{}#", record.action, record.effect));
        match &record.fields {
            None => sort.push('-'),
            Some(fields) => {
                let mut sorted: Vec<&str> = fields.iter().map(String::as_str).collect();
                sorted.sort_unstable();
                sorted.dedup();
                sort.push_str(&sorted.len().to_string());
                for field in sorted {
                    sort.push('#');
                    push_component(&mut sort, field);
                }
            }
        }
        Self {
            partition: Self::partition_for(record.identity_type, &record.identity_id),
            sort,
        }
    }
}

impl fmt::Display for IdentityPermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

/// Already-authenticated principal.
///
/// `roles` are group ids for the dynamic strategy and application role
/// names for the static one.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(ParseError::HttpMethod(value.to_string())),
        }
    }
}
