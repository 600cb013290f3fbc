//! Element identity and per-element display state

use std::fmt;
use uuid::Uuid;

/// Identity of a GATT element.
///
/// A service key has neither characteristic nor descriptor, a characteristic
/// key has no descriptor. Distinct tuples are always distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub service: Uuid,
    pub instance: u16,
    pub characteristic: Option<Uuid>,
    pub descriptor: Option<Uuid>,
}

impl ElementKey {
    pub fn service(service: Uuid, instance: u16) -> Self {
        Self {
            service,
            instance,
            characteristic: None,
            descriptor: None,
        }
    }

    pub fn characteristic(service: Uuid, instance: u16, characteristic: Uuid) -> Self {
        Self {
            characteristic: Some(characteristic),
            ..Self::service(service, instance)
        }
    }

    pub fn descriptor(service: Uuid, instance: u16, characteristic: Uuid, descriptor: Uuid) -> Self {
        Self {
            descriptor: Some(descriptor),
            ..Self::characteristic(service, instance, characteristic)
        }
    }

    /// Owning element, `None` for services
    pub fn parent(&self) -> Option<ElementKey> {
        match (self.characteristic, self.descriptor) {
            (Some(_), Some(_)) => Some(Self {
                descriptor: None,
                ..*self
            }),
            (Some(_), None) => Some(Self::service(self.service, self.instance)),
            _ => None,
        }
    }
}

/// Concatenated form used in log lines
impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let part = |uuid: Option<Uuid>| uuid.map_or_else(|| "null".to_string(), |u| u.to_string());
        write!(
            f,
            "{}{}{}{}",
            self.service,
            self.instance,
            part(self.characteristic),
            part(self.descriptor)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataFormat {
    /// UTF-8 text
    Text,
    /// Dash separated hex byte pairs
    #[default]
    Hex,
}

impl DataFormat {
    pub fn toggled(self) -> Self {
        match self {
            DataFormat::Text => DataFormat::Hex,
            DataFormat::Hex => DataFormat::Text,
        }
    }
}

/// A row of the inspector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    pub key: ElementKey,
    /// Known name, or the UUID string when the UUID is not known
    pub name: String,
    pub uuid: String,
    pub showing_name: bool,
    pub data_format: DataFormat,
}

impl ElementPath {
    pub fn new(key: ElementKey, uuid: Uuid, known_name: Option<&str>) -> Self {
        let uuid = uuid.to_string();
        Self {
            key,
            name: known_name.map_or_else(|| uuid.clone(), str::to_string),
            uuid,
            showing_name: true,
            data_format: DataFormat::default(),
        }
    }

    /// Name or UUID depending on the toggle
    pub fn label(&self) -> &str {
        if self.showing_name {
            &self.name
        } else {
            &self.uuid
        }
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
