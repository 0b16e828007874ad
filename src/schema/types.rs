//! Schema snapshot model
//!
//! Elements refer to each other by name or OID. A [`Schema`] indexes every
//! name case-insensitively and guarantees the references resolve and the
//! superior relations are acyclic.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};

/// An attribute type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    pub oid: String,
    #[serde(default)]
    pub names: Vec<String>,
    /// Name or OID of the superior attribute type
    #[serde(default)]
    pub superior: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AttributeType {
    pub fn new(oid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            names: vec![name.into()],
            superior: None,
            description: None,
        }
    }

    pub fn with_superior(mut self, superior: impl Into<String>) -> Self {
        self.superior = Some(superior.into());
        self
    }

    /// First name, or the OID when unnamed
    pub fn name_or_oid(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.oid)
    }

    pub fn has_name_or_oid(&self, name: &str) -> bool {
        self.oid.eq_ignore_ascii_case(name) || self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// RFC 4512 `AttributeTypeDescription`
    pub fn definition(&self) -> String {
        let mut def = format!("( {}", self.oid);
        push_names(&mut def, &self.names);
        push_description(&mut def, self.description.as_deref());
        if let Some(sup) = &self.superior {
            def.push_str(&format!(" SUP {}", sup));
        }
        def.push_str(" )");
        def
    }
}

/// Object class kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClassKind {
    #[default]
    Structural,
    Auxiliary,
    Abstract,
}

impl ObjectClassKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ObjectClassKind::Structural => "STRUCTURAL",
            ObjectClassKind::Auxiliary => "AUXILIARY",
            ObjectClassKind::Abstract => "ABSTRACT",
        }
    }
}

/// An object class definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectClass {
    pub oid: String,
    #[serde(default)]
    pub names: Vec<String>,
    /// Names or OIDs of the superior classes
    #[serde(default)]
    pub superiors: Vec<String>,
    #[serde(default)]
    pub kind: ObjectClassKind,
    /// Declared required attributes, inherited ones excluded
    #[serde(default)]
    pub required: Vec<String>,
    /// Declared optional attributes, inherited ones excluded
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ObjectClass {
    pub fn new(oid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            names: vec![name.into()],
            superiors: Vec::new(),
            kind: ObjectClassKind::Structural,
            required: Vec::new(),
            optional: Vec::new(),
            description: None,
        }
    }

    pub fn with_superior(mut self, superior: impl Into<String>) -> Self {
        self.superiors.push(superior.into());
        self
    }

    pub fn with_required(mut self, attribute: impl Into<String>) -> Self {
        self.required.push(attribute.into());
        self
    }

    pub fn with_optional(mut self, attribute: impl Into<String>) -> Self {
        self.optional.push(attribute.into());
        self
    }

    pub fn name_or_oid(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.oid)
    }

    pub fn has_name_or_oid(&self, name: &str) -> bool {
        self.oid.eq_ignore_ascii_case(name) || self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// RFC 4512 `ObjectClassDescription`
    pub fn definition(&self) -> String {
        let mut def = format!("( {}", self.oid);
        push_names(&mut def, &self.names);
        push_description(&mut def, self.description.as_deref());
        push_oids(&mut def, "SUP", &self.superiors);
        def.push(' ');
        def.push_str(self.kind.keyword());
        push_oids(&mut def, "MUST", &self.required);
        push_oids(&mut def, "MAY", &self.optional);
        def.push_str(" )");
        def
    }
}

fn push_names(def: &mut String, names: &[String]) {
    match names {
        [] => {}
        [name] => def.push_str(&format!(" NAME '{}'", name)),
        names => {
            let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
            def.push_str(&format!(" NAME ( {} )", quoted.join(" ")));
        }
    }
}

fn push_description(def: &mut String, description: Option<&str>) {
    if let Some(desc) = description {
        let escaped = desc.replace('\\', "\\5C").replace('\'', "\\27");
        def.push_str(&format!(" DESC '{}'", escaped));
    }
}

fn push_oids(def: &mut String, keyword: &str, oids: &[String]) {
    match oids {
        [] => {}
        [oid] => def.push_str(&format!(" {} {}", keyword, oid)),
        oids => def.push_str(&format!(" {} ( {} )", keyword, oids.join(" $ "))),
    }
}

/// Immutable, validated schema snapshot
#[derive(Debug, Clone)]
pub struct Schema {
    attribute_types: Vec<AttributeType>,
    object_classes: Vec<ObjectClass>,
    attribute_index: HashMap<String, usize>,
    class_index: HashMap<String, usize>,
}

fn index_names<'a>(
    kind: &str,
    entries: impl Iterator<Item = (usize, &'a str, &'a [String])>,
) -> ConsoleResult<HashMap<String, usize>> {
    let mut index = HashMap::new();
    for (pos, oid, names) in entries {
        for key in std::iter::once(oid).chain(names.iter().map(String::as_str)) {
            if index.insert(key.to_ascii_lowercase(), pos).is_some_and(|prev| prev != pos) {
                return Err(ConsoleError::validation(format!(
                    "duplicate {} name or OID '{}'",
                    kind, key
                )));
            }
        }
    }
    Ok(index)
}

impl Schema {
    pub fn new(
        attribute_types: Vec<AttributeType>,
        object_classes: Vec<ObjectClass>,
    ) -> ConsoleResult<Self> {
        let attribute_index = index_names(
            "attribute type",
            attribute_types
                .iter()
                .enumerate()
                .map(|(i, a)| (i, a.oid.as_str(), a.names.as_slice())),
        )?;
        let class_index = index_names(
            "object class",
            object_classes
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.oid.as_str(), c.names.as_slice())),
        )?;

        let schema = Self {
            attribute_types,
            object_classes,
            attribute_index,
            class_index,
        };
        schema.check_references()?;
        schema.check_attribute_cycles()?;
        schema.check_class_cycles()?;
        Ok(schema)
    }

    fn check_references(&self) -> ConsoleResult<()> {
        for attr in &self.attribute_types {
            if let Some(sup) = &attr.superior {
                if self.attribute_type(sup).is_none() {
                    return Err(ConsoleError::validation(format!(
                        "attribute type {} has unknown superior {}",
                        attr.name_or_oid(),
                        sup
                    )));
                }
            }
        }
        for class in &self.object_classes {
            if let Some(sup) = class.superiors.iter().find(|s| self.object_class(s).is_none()) {
                return Err(ConsoleError::validation(format!(
                    "object class {} has unknown superior {}",
                    class.name_or_oid(),
                    sup
                )));
            }
            let mut declared = class.required.iter().chain(class.optional.iter());
            if let Some(attr) = declared.find(|a| self.attribute_type(a).is_none()) {
                return Err(ConsoleError::validation(format!(
                    "object class {} references unknown attribute type {}",
                    class.name_or_oid(),
                    attr
                )));
            }
        }
        Ok(())
    }

    fn check_attribute_cycles(&self) -> ConsoleResult<()> {
        for start in 0..self.attribute_types.len() {
            let mut current = self.attribute_types[start].superior.as_deref();
            let mut steps = 0;
            while let Some(sup) = current {
                let pos = self.attribute_index.get(&sup.to_ascii_lowercase()).copied();
                steps += 1;
                if pos == Some(start) || steps > self.attribute_types.len() {
                    return Err(ConsoleError::validation(format!(
                        "attribute type {} is its own superior",
                        self.attribute_types[start].name_or_oid()
                    )));
                }
                current = pos.and_then(|p| self.attribute_types[p].superior.as_deref());
            }
        }
        Ok(())
    }

    fn check_class_cycles(&self) -> ConsoleResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Visiting,
            Done,
        }

        fn visit(schema: &Schema, pos: usize, marks: &mut [Mark]) -> ConsoleResult<()> {
            match marks[pos] {
                Mark::Done => return Ok(()),
                Mark::Visiting => {
                    return Err(ConsoleError::validation(format!(
                        "object class {} is its own superior",
                        schema.object_classes[pos].name_or_oid()
                    )))
                }
                Mark::New => {}
            }
            marks[pos] = Mark::Visiting;
            for sup in &schema.object_classes[pos].superiors {
                if let Some(&next) = schema.class_index.get(&sup.to_ascii_lowercase()) {
                    visit(schema, next, marks)?;
                }
            }
            marks[pos] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.object_classes.len()];
        for pos in 0..self.object_classes.len() {
            visit(self, pos, &mut marks)?;
        }
        Ok(())
    }

    pub fn attribute_types(&self) -> &[AttributeType] {
        &self.attribute_types
    }

    pub fn object_classes(&self) -> &[ObjectClass] {
        &self.object_classes
    }

    pub fn attribute_type(&self, name: &str) -> Option<&AttributeType> {
        self.attribute_index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.attribute_types[i])
    }

    pub fn object_class(&self, name: &str) -> Option<&ObjectClass> {
        self.class_index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.object_classes[i])
    }

    /// Superiors of `attribute`, nearest first
    pub fn superior_chain(&self, attribute: &AttributeType) -> Vec<&AttributeType> {
        let mut chain = Vec::new();
        let mut current = attribute.superior.as_deref().and_then(|s| self.attribute_type(s));
        while let Some(sup) = current {
            chain.push(sup);
            current = sup.superior.as_deref().and_then(|s| self.attribute_type(s));
        }
        chain
    }

    /// True when `ancestor` is in the superior chain of `attribute`
    pub fn attribute_is_descendant_of(&self, attribute: &AttributeType, ancestor: &AttributeType) -> bool {
        self.superior_chain(attribute)
            .iter()
            .any(|sup| sup.oid == ancestor.oid)
    }

    /// Direct superior classes
    pub fn superior_classes(&self, class: &ObjectClass) -> Vec<&ObjectClass> {
        class
            .superiors
            .iter()
            .filter_map(|s| self.object_class(s))
            .collect()
    }

    /// True when `ancestor` is a transitive superior of `class`
    pub fn is_descendant_of(&self, class: &ObjectClass, ancestor: &ObjectClass) -> bool {
        let mut visited = BTreeSet::new();
        let mut pending = self.superior_classes(class);
        while let Some(current) = pending.pop() {
            if current.oid == ancestor.oid {
                return true;
            }
            if visited.insert(current.oid.as_str()) {
                pending.extend(self.superior_classes(current));
            }
        }
        false
    }

    fn attribute_chain(
        &self,
        class: &ObjectClass,
        declared: fn(&ObjectClass) -> &[String],
    ) -> Vec<&AttributeType> {
        let mut seen = BTreeSet::new();
        let mut expanded = BTreeSet::new();
        let mut chain = Vec::new();
        let mut pending = vec![class];
        while let Some(current) = pending.pop() {
            if !expanded.insert(current.oid.as_str()) {
                continue;
            }
            for name in declared(current) {
                if let Some(attr) = self.attribute_type(name) {
                    if seen.insert(attr.oid.clone()) {
                        chain.push(attr);
                    }
                }
            }
            // reversed so the first superior is expanded first
            pending.extend(self.superior_classes(current).into_iter().rev());
        }
        chain
    }

    /// Required attributes including inherited ones
    pub fn required_attribute_chain(&self, class: &ObjectClass) -> Vec<&AttributeType> {
        self.attribute_chain(class, |c| c.required.as_slice())
    }

    /// Optional attributes including inherited ones
    pub fn optional_attribute_chain(&self, class: &ObjectClass) -> Vec<&AttributeType> {
        self.attribute_chain(class, |c| c.optional.as_slice())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "schema with {} attribute types and {} object classes",
            self.attribute_types.len(),
            self.object_classes.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_schema() -> Schema {
        Schema::new(
            vec![
                AttributeType::new("2.5.4.41", "name"),
                AttributeType::new("2.5.4.3", "cn").with_superior("name"),
                AttributeType::new("2.5.4.4", "sn").with_superior("name"),
                AttributeType::new("2.5.4.0", "objectClass"),
                AttributeType::new("0.9.2342.19200300.100.1.3", "mail"),
            ],
            vec![
                ObjectClass::new("2.5.6.0", "top").with_required("objectClass"),
                ObjectClass::new("2.5.6.6", "person")
                    .with_superior("top")
                    .with_required("cn")
                    .with_required("sn"),
                ObjectClass::new("2.16.840.1.113730.3.2.2", "inetOrgPerson")
                    .with_superior("person")
                    .with_optional("mail"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let schema = person_schema();
        assert_eq!(schema.attribute_type("CN").unwrap().oid, "2.5.4.3");
        assert_eq!(schema.object_class("2.5.6.6").unwrap().name_or_oid(), "person");
    }

    #[test]
    fn test_superior_chain() {
        let schema = person_schema();
        let cn = schema.attribute_type("cn").unwrap();
        let chain: Vec<&str> = schema.superior_chain(cn).iter().map(|a| a.name_or_oid()).collect();
        assert_eq!(chain, vec!["name"]);
        assert!(schema.attribute_is_descendant_of(cn, schema.attribute_type("name").unwrap()));
    }

    #[test]
    fn test_class_descent_and_chains() {
        let schema = person_schema();
        let inet = schema.object_class("inetOrgPerson").unwrap();
        let top = schema.object_class("top").unwrap();
        assert!(schema.is_descendant_of(inet, top));
        assert!(!schema.is_descendant_of(top, inet));

        let required: Vec<&str> = schema
            .required_attribute_chain(inet)
            .iter()
            .map(|a| a.name_or_oid())
            .collect();
        assert_eq!(required, vec!["cn", "sn", "objectClass"]);
        assert_eq!(schema.optional_attribute_chain(inet).len(), 1);
    }

    /// Two classes per level, each inheriting from both classes below it
    fn diamond_schema(levels: usize) -> Schema {
        let mut classes = vec![ObjectClass::new("1.1.0", "base").with_required("cn")];
        for level in 1..=levels {
            for (arc, side) in [(1, "l"), (2, "r")] {
                let mut class =
                    ObjectClass::new(format!("1.1.{}.{}", level, arc), format!("{}{}", side, level));
                if level == 1 {
                    class = class.with_superior("base");
                } else {
                    class = class
                        .with_superior(format!("l{}", level - 1))
                        .with_superior(format!("r{}", level - 1));
                }
                classes.push(class);
            }
        }
        Schema::new(vec![AttributeType::new("2.5.4.3", "cn")], classes).unwrap()
    }

    #[test]
    fn test_diamond_hierarchy_walks_each_class_once() {
        let schema = diamond_schema(64);
        let leaf = schema.object_class("l64").unwrap();
        let base = schema.object_class("base").unwrap();
        let unrelated = schema.object_class("r64").unwrap();

        assert!(schema.is_descendant_of(leaf, base));
        assert!(!schema.is_descendant_of(leaf, unrelated));
        let required: Vec<&str> = schema
            .required_attribute_chain(leaf)
            .iter()
            .map(|a| a.name_or_oid())
            .collect();
        assert_eq!(required, vec!["cn"]);
    }

    #[test]
    fn test_rejects_bad_snapshots() {
        let dup = Schema::new(
            vec![AttributeType::new("1.1", "a"), AttributeType::new("1.2", "A")],
            vec![],
        );
        assert!(dup.unwrap_err().is_validation());

        let unknown = Schema::new(vec![AttributeType::new("1.1", "a").with_superior("b")], vec![]);
        assert!(unknown.is_err());

        let attr_cycle = Schema::new(
            vec![
                AttributeType::new("1.1", "a").with_superior("b"),
                AttributeType::new("1.2", "b").with_superior("a"),
            ],
            vec![],
        );
        assert!(attr_cycle.is_err());

        let class_cycle = Schema::new(
            vec![],
            vec![
                ObjectClass::new("1.1", "x").with_superior("y"),
                ObjectClass::new("1.2", "y").with_superior("x"),
            ],
        );
        assert!(class_cycle.is_err());
    }

    #[test]
    fn test_definitions() {
        let schema = person_schema();
        assert_eq!(
            schema.attribute_type("cn").unwrap().definition(),
            "( 2.5.4.3 NAME 'cn' SUP name )"
        );
        assert_eq!(
            schema.object_class("person").unwrap().definition(),
            "( 2.5.6.6 NAME 'person' SUP top STRUCTURAL MUST ( cn $ sn ) )"
        );
    }
}
