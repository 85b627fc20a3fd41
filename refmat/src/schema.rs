use crate::AppError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Attribute,
    Reference,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub referenced_type: Option<String>,
}

impl FieldDescriptor {
    pub fn is_reference(&self) -> bool {
        self.kind == FieldKind::Reference
    }

    pub fn is_collection(&self) -> bool {
        self.kind == FieldKind::Collection
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDescriptor>,
}

impl ClassDescriptor {
    pub fn new(name: &str) -> Self {
        ClassDescriptor { name: name.to_string(), parents: Vec::new(), fields: BTreeMap::new() }
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    pub fn attribute(self, name: &str) -> Self {
        self.field(name, FieldKind::Attribute, None)
    }

    pub fn reference(self, name: &str, referenced_type: &str) -> Self {
        self.field(name, FieldKind::Reference, Some(referenced_type))
    }

    pub fn collection(self, name: &str, referenced_type: &str) -> Self {
        self.field(name, FieldKind::Collection, Some(referenced_type))
    }

    fn field(mut self, name: &str, kind: FieldKind, referenced_type: Option<&str>) -> Self {
        let descriptor = FieldDescriptor { name: name.to_string(), kind, referenced_type: referenced_type.map(str::to_string) };
        self.fields.insert(name.to_string(), descriptor);
        self
    }
}

/// Class hierarchy and field declarations of one entity graph. Field lookups follow
/// inheritance, a class sees every field declared on any of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "SchemaDef")]
pub struct Schema {
    pub name: String,
    classes: BTreeMap<String, ClassDescriptor>,
    children: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct SchemaDef {
    name: String,
    classes: Vec<ClassDescriptor>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = AppError;

    fn try_from(def: SchemaDef) -> Result<Self, Self::Error> {
        def.classes.into_iter().fold(Schema::builder(&def.name), SchemaBuilder::class).build()
    }
}

pub struct SchemaBuilder {
    name: String,
    classes: Vec<ClassDescriptor>,
}

impl SchemaBuilder {
    pub fn class(mut self, class: ClassDescriptor) -> Self {
        self.classes.push(class);
        self
    }

    pub fn build(self) -> Result<Schema, AppError> {
        let mut classes = BTreeMap::new();
        for class in self.classes {
            if classes.contains_key(&class.name) {
                return Err(AppError::schema(format!("class {} declared twice in {}", class.name, self.name)));
            }
            classes.insert(class.name.clone(), class);
        }
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for class in classes.values() {
            for parent in &class.parents {
                if !classes.contains_key(parent) {
                    return Err(AppError::schema(format!("class {} extends unknown class {}", class.name, parent)));
                }
                children.entry(parent.clone()).or_default().push(class.name.clone());
            }
        }
        let schema = Schema { name: self.name, classes, children };
        for name in schema.classes.keys() {
            if schema.parents_reach(name, name) {
                return Err(AppError::schema(format!("class {} inherits from itself", name)));
            }
        }
        Ok(schema)
    }
}

impl Schema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder { name: name.to_string(), classes: Vec::new() }
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values()
    }

    pub fn require_class(&self, name: &str) -> Result<&ClassDescriptor, AppError> {
        self.class(name).ok_or_else(|| AppError::schema(format!("class {} is not part of the {} model", name, self.name)))
    }

    /// The class itself followed by all of its ancestors, breadth first.
    pub fn ancestors(&self, class: &str) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([class]);
        while let Some(name) = queue.pop_front() {
            if let Some(descriptor) = self.classes.get(name) {
                if seen.insert(name) {
                    out.push(descriptor.name.as_str());
                    queue.extend(descriptor.parents.iter().map(String::as_str));
                }
            }
        }
        out
    }

    /// The class itself followed by every class that inherits from it.
    pub fn descendants(&self, class: &str) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([class]);
        while let Some(name) = queue.pop_front() {
            if let Some(descriptor) = self.classes.get(name) {
                if seen.insert(name) {
                    out.push(descriptor.name.as_str());
                    if let Some(children) = self.children.get(name) {
                        queue.extend(children.iter().map(String::as_str));
                    }
                }
            }
        }
        out
    }

    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        class == ancestor || self.parents_reach(class, ancestor)
    }

    fn parents_reach(&self, class: &str, target: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = self.classes.get(class).map(|c| c.parents.iter().map(String::as_str).collect()).unwrap_or_default();
        while let Some(name) = queue.pop_front() {
            if name == target {
                return true;
            }
            if seen.insert(name) {
                if let Some(descriptor) = self.classes.get(name) {
                    queue.extend(descriptor.parents.iter().map(String::as_str));
                }
            }
        }
        false
    }

    /// Field visible on `class`, declared there or inherited.
    pub fn field(&self, class: &str, field: &str) -> Option<&FieldDescriptor> {
        self.ancestors(class).into_iter().find_map(|name| self.classes.get(name).and_then(|c| c.fields.get(field)))
    }

    /// All fields visible on `class`, nearest declaration wins.
    pub fn fields(&self, class: &str) -> BTreeMap<&str, &FieldDescriptor> {
        let mut out = BTreeMap::new();
        for name in self.ancestors(class) {
            if let Some(descriptor) = self.classes.get(name) {
                for (field_name, field) in &descriptor.fields {
                    out.entry(field_name.as_str()).or_insert(field);
                }
            }
        }
        out
    }

    /// First declaration of `field` on `class` or any of its subclasses. Polymorphic graphs
    /// may carry a field on only some subtypes of the declared class.
    pub fn declared_below(&self, class: &str, field: &str) -> Option<&FieldDescriptor> {
        self.descendants(class).into_iter().find_map(|name| self.field(name, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::builder("test")
            .class(ClassDescriptor::new("BioEntity").attribute("identifier").collection("subjects", "Relation"))
            .class(ClassDescriptor::new("Gene").extends("BioEntity").collection("transcripts", "Transcript"))
            .class(ClassDescriptor::new("Transcript").extends("BioEntity").reference("gene", "Gene"))
            .class(ClassDescriptor::new("MRNA").extends("Transcript").collection("UTRs", "UTR"))
            .class(ClassDescriptor::new("UTR").extends("BioEntity"))
            .class(ClassDescriptor::new("Relation").reference("object", "BioEntity").reference("subject", "BioEntity"))
            .build()
            .unwrap()
    }

    #[test]
    fn fields_are_inherited() {
        let schema = sample();
        assert_eq!(schema.field("MRNA", "gene").unwrap().kind, FieldKind::Reference);
        assert_eq!(schema.field("MRNA", "identifier").unwrap().kind, FieldKind::Attribute);
        assert!(schema.field("Transcript", "UTRs").is_none());
        assert!(schema.fields("MRNA").contains_key("subjects"));
    }

    #[test]
    fn hierarchy_queries() {
        let schema = sample();
        assert_eq!(schema.ancestors("MRNA"), vec!["MRNA", "Transcript", "BioEntity"]);
        assert!(schema.is_a("MRNA", "BioEntity"));
        assert!(!schema.is_a("Gene", "Transcript"));
        let below = schema.descendants("BioEntity");
        assert!(below.contains(&"MRNA") && below.contains(&"UTR"));
        assert!(schema.declared_below("Transcript", "UTRs").is_some());
        assert!(schema.declared_below("Gene", "UTRs").is_none());
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let result = Schema::builder("broken").class(ClassDescriptor::new("Exon").extends("Feature")).build();
        assert!(result.unwrap_err().is_schema_error());
    }

    #[test]
    fn inheritance_cycle_is_rejected() {
        let result = Schema::builder("cyclic")
            .class(ClassDescriptor::new("A").extends("B"))
            .class(ClassDescriptor::new("B").extends("A"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn schema_loads_from_json() {
        let json = r#"{
            "name": "mini",
            "classes": [
                { "name": "Chromosome" },
                { "name": "Exon", "fields": { "chromosome": { "name": "chromosome", "kind": "Reference", "referenced_type": "Chromosome" } } }
            ]
        }"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert!(schema.field("Exon", "chromosome").unwrap().is_reference());
        assert!(schema.class("Chromosome").is_some());
    }
}
