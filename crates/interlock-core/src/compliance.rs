use crate::tags::PpeTag;
use std::collections::HashSet;

/// The PPE classes an operator must wear. Fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredSet {
    ordered: Vec<PpeTag>,
    members: HashSet<PpeTag>,
}

impl RequiredSet {
    /// Builds the set, dropping repeated tags while keeping first-seen order.
    pub fn new<I: IntoIterator<Item = PpeTag>>(tags: I) -> Self {
        let mut ordered = Vec::new();
        let mut members = HashSet::new();
        for tag in tags {
            if members.insert(tag) {
                ordered.push(tag);
            }
        }
        Self { ordered, members }
    }

    pub fn contains(&self, tag: PpeTag) -> bool {
        self.members.contains(&tag)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PpeTag> + '_ {
        self.ordered.iter().copied()
    }
}

impl FromIterator<PpeTag> for RequiredSet {
    fn from_iter<I: IntoIterator<Item = PpeTag>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Tags reported by one inference pass. One entry per detected box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult(Vec<PpeTag>);

impl DetectionResult {
    pub fn new(tags: Vec<PpeTag>) -> Self {
        Self(tags)
    }

    pub fn tags(&self) -> &[PpeTag] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Required tags with no matching box in this result.
    pub fn missing<'a>(&'a self, required: &'a RequiredSet) -> impl Iterator<Item = PpeTag> + 'a {
        required.iter().filter(move |tag| !self.0.contains(tag))
    }
}

impl FromIterator<PpeTag> for DetectionResult {
    fn from_iter<I: IntoIterator<Item = PpeTag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// True when every required tag shows up at least once in `detected`.
///
/// A failed detection (`None`), an empty result, or fewer boxes than required
/// classes is never compliant. Repeated boxes of one class count once.
pub fn is_compliant(required: &RequiredSet, detected: Option<&DetectionResult>) -> bool {
    let detected = match detected {
        Some(detected) => detected,
        None => return false,
    };
    if detected.is_empty() || detected.len() < required.len() {
        return false;
    }
    let seen: HashSet<PpeTag> = detected.tags().iter().copied().collect();
    required.iter().all(|tag| seen.contains(&tag))
}
