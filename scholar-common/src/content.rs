//! Form content editing and question numbering
//!
//! Question numbers are dense and 1-based across the whole form, in section
//! display order. Every editor operation here renumbers before returning, so
//! callers never observe a gap or a duplicate.

use std::collections::HashSet;

use crate::models::{
    FormContent, Question, QuestionType, Section, SectionKind, IDENTITY_SECTION_ORDER,
};
use crate::{Error, Result};

pub const IDENTITY_SECTION_TITLE: &str = "Identity Verification";
pub const IDENTITY_QUESTION_TEXT: &str = "Enter your child's BC number(s), separated by commas";

/// Recompute question sequence numbers.
///
/// Sections are sorted by `order` (stable). Each section's questions keep their
/// relative order and are numbered with one counter running across section
/// boundaries. Questions whose section is unknown are appended last and still
/// numbered. The question vector is left in numbering order.
pub fn renumber(content: &mut FormContent) {
    content.sections.sort_by_key(|s| s.order);

    let known: HashSet<&str> = content.sections.iter().map(|s| s.id.as_str()).collect();
    let mut ordered: Vec<Question> = Vec::with_capacity(content.questions.len());

    for section in &content.sections {
        ordered.extend(
            content
                .questions
                .iter()
                .filter(|q| q.section_id.as_deref() == Some(section.id.as_str()))
                .cloned(),
        );
    }
    ordered.extend(
        content
            .questions
            .iter()
            .filter(|q| q.section_id.as_deref().map_or(true, |id| !known.contains(id)))
            .cloned(),
    );

    for (index, question) in ordered.iter_mut().enumerate() {
        question.sequence = index as u32 + 1;
    }
    content.questions = ordered;
}

/// Display number of a section: the identity section is "0", the others count from 1
pub fn section_number(content: &FormContent, section_id: &str) -> Option<u32> {
    let mut sorted: Vec<&Section> = content.sections.iter().collect();
    sorted.sort_by_key(|s| s.order);

    let mut next = 1;
    for section in sorted {
        let number = if section.is_identity() {
            0
        } else {
            let n = next;
            next += 1;
            n
        };
        if section.id == section_id {
            return Some(number);
        }
    }
    None
}

impl FormContent {
    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn identity_section(&self) -> Option<&Section> {
        self.sections.iter().find(|s| s.is_identity())
    }

    /// First standard section in display order
    pub fn first_standard_section(&self) -> Option<&Section> {
        self.sections
            .iter()
            .filter(|s| !s.is_identity())
            .min_by_key(|s| s.order)
    }

    fn question_index(&self, question_id: &str) -> Result<usize> {
        self.questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| Error::not_found(format!("question {}", question_id)))
    }

    fn require_section(&self, section_id: &str) -> Result<()> {
        match self.section(section_id) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("section {}", section_id))),
        }
    }

    /// Vector position right after the last question of `section_id`
    fn insertion_point(&self, section_id: Option<&str>) -> usize {
        self.questions
            .iter()
            .rposition(|q| q.section_id.as_deref() == section_id)
            .map(|i| i + 1)
            .unwrap_or(self.questions.len())
    }

    fn is_identity_question(&self, question: &Question) -> bool {
        question.question_type == QuestionType::StudentLookup
            && question
                .section_id
                .as_deref()
                .and_then(|id| self.section(id))
                .map_or(false, Section::is_identity)
    }

    /// Append a question to the end of `section_id` (or the first standard
    /// section when none is given). Returns the question id.
    pub fn add_question(&mut self, mut question: Question, section_id: Option<&str>) -> Result<String> {
        let target = match section_id {
            Some(id) => {
                self.require_section(id)?;
                Some(id.to_string())
            }
            None => self.first_standard_section().map(|s| s.id.clone()),
        };

        question.normalize();
        question.section_id = target;
        let id = question.id.clone();
        let at = self.insertion_point(question.section_id.as_deref());
        self.questions.insert(at, question);
        renumber(self);
        Ok(id)
    }

    pub fn delete_question(&mut self, question_id: &str) -> Result<Question> {
        let index = self.question_index(question_id)?;
        if self.is_identity_question(&self.questions[index]) {
            return Err(Error::validation("the identity verification question cannot be removed"));
        }
        let removed = self.questions.remove(index);
        renumber(self);
        Ok(removed)
    }

    /// Duplicate a question directly after its source. Returns the new id.
    pub fn copy_question(&mut self, question_id: &str) -> Result<String> {
        let index = self.question_index(question_id)?;
        if self.is_identity_question(&self.questions[index]) {
            return Err(Error::validation("the identity verification question cannot be copied"));
        }
        let mut copy = self.questions[index].clone();
        copy.id = uuid::Uuid::new_v4().to_string();
        let id = copy.id.clone();
        self.questions.insert(index + 1, copy);
        renumber(self);
        Ok(id)
    }

    /// Drag-reorder inside one section; positions are indexes within that section
    pub fn reorder_within_section(&mut self, section_id: &str, from: usize, to: usize) -> Result<()> {
        self.require_section(section_id)?;
        renumber(self);

        let positions: Vec<usize> = self
            .questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.section_id.as_deref() == Some(section_id))
            .map(|(i, _)| i)
            .collect();
        if from >= positions.len() || to >= positions.len() {
            return Err(Error::validation(format!(
                "position out of range: section has {} questions",
                positions.len()
            )));
        }

        // After renumbering a section's questions are contiguous
        let start = positions[0];
        let question = self.questions.remove(start + from);
        self.questions.insert(start + to, question);
        renumber(self);
        Ok(())
    }

    /// Move a question to the end of another section
    pub fn move_question(&mut self, question_id: &str, target_section_id: &str) -> Result<()> {
        self.require_section(target_section_id)?;
        let index = self.question_index(question_id)?;
        if self.is_identity_question(&self.questions[index]) {
            return Err(Error::validation("the identity verification question cannot be moved"));
        }
        if self.section(target_section_id).map_or(false, Section::is_identity) {
            return Err(Error::validation("questions cannot be moved into the identity section"));
        }

        let mut question = self.questions.remove(index);
        question.section_id = Some(target_section_id.to_string());
        let at = self.insertion_point(Some(target_section_id));
        self.questions.insert(at, question);
        renumber(self);
        Ok(())
    }

    /// Append a standard section after the last one. Returns the section id.
    pub fn add_section(&mut self, title: impl Into<String>) -> String {
        let order = self
            .sections
            .iter()
            .filter(|s| !s.is_identity())
            .map(|s| s.order + 1)
            .max()
            .unwrap_or(0);
        let section = Section::new(title, order);
        let id = section.id.clone();
        self.sections.push(section);
        renumber(self);
        id
    }

    /// Delete a section; its questions move to the first remaining standard
    /// section (or become unsectioned when none is left).
    pub fn delete_section(&mut self, section_id: &str) -> Result<()> {
        let index = self
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or_else(|| Error::not_found(format!("section {}", section_id)))?;
        if self.sections[index].is_identity() {
            return Err(Error::validation("the identity verification section cannot be deleted"));
        }

        self.sections.remove(index);
        let fallback = self.first_standard_section().map(|s| s.id.clone());
        for question in &mut self.questions {
            if question.section_id.as_deref() == Some(section_id) {
                question.section_id = fallback.clone();
            }
        }
        renumber(self);
        Ok(())
    }

    /// Reorder standard sections. `ordered_ids` must list every standard
    /// section exactly once; the identity section keeps its pinned order.
    pub fn reorder_sections(&mut self, ordered_ids: &[String]) -> Result<()> {
        let standard: HashSet<&str> = self
            .sections
            .iter()
            .filter(|s| !s.is_identity())
            .map(|s| s.id.as_str())
            .collect();
        let requested: HashSet<&str> = ordered_ids.iter().map(String::as_str).collect();
        if requested.len() != ordered_ids.len() || requested != standard {
            return Err(Error::validation(
                "section order must list every section exactly once",
            ));
        }

        for section in &mut self.sections {
            if let Some(position) = ordered_ids.iter().position(|id| *id == section.id) {
                section.order = position as i32;
            }
        }
        renumber(self);
        Ok(())
    }

    /// Create the identity-verification section with its single required
    /// student-lookup question, ahead of all other content. No-op when an
    /// identity section already exists. Returns true when one was created.
    pub fn ensure_identity_section(&mut self) -> bool {
        if self.identity_section().is_some() {
            return false;
        }

        let section = Section {
            kind: SectionKind::Identity,
            ..Section::new(IDENTITY_SECTION_TITLE, IDENTITY_SECTION_ORDER)
        };
        let mut question = Question::new(QuestionType::StudentLookup, IDENTITY_QUESTION_TEXT);
        question.required = true;
        question.section_id = Some(section.id.clone());

        self.sections.insert(0, section);
        self.questions.insert(0, question);
        renumber(self);
        true
    }
}
