use refmat::{AppError, ClassDescriptor, Schema};

/// Genomic model the reference passes run against. Every bioentity takes part in relations
/// through `subjects` (relations it is the object of) and `objects` (relations it is the
/// subject of), loaders fill those and the fields marked as loaded below.
pub fn schema() -> Result<Schema, AppError> {
    Schema::builder("genomic")
        .class(
            ClassDescriptor::new("BioEntity")
                .attribute("identifier")
                .collection("subjects", "Relation")
                .collection("objects", "Relation")
                .collection("annotations", "Annotation"),
        )
        .class(
            ClassDescriptor::new("Gene")
                .extends("BioEntity")
                .reference("chromosome", "Chromosome")
                .collection("transcripts", "Transcript")
                .collection("exons", "Exon")
                .collection("UTRs", "UTR")
                .collection("CDSs", "CDS")
                .collection("proteins", "Protein")
                .collection("GOTerms", "GOTerm")
                .collection("phenotypes", "Phenotype")
                .collection("orthologues", "Orthologue"),
        )
        .class(
            ClassDescriptor::new("Transcript")
                .extends("BioEntity")
                .reference("gene", "Gene")
                .reference("chromosome", "Chromosome")
                // loaded
                .reference("protein", "Protein")
                .collection("exons", "Exon"),
        )
        .class(
            ClassDescriptor::new("MRNA")
                .extends("Transcript")
                .collection("introns", "Intron")
                // loaded
                .collection("UTRs", "UTR")
                .collection("CDSs", "CDS"),
        )
        .class(
            ClassDescriptor::new("Exon")
                .extends("BioEntity")
                .reference("gene", "Gene")
                .reference("chromosome", "Chromosome")
                .collection("transcripts", "Transcript"),
        )
        .class(ClassDescriptor::new("Intron").extends("BioEntity").collection("MRNAs", "MRNA"))
        .class(ClassDescriptor::new("UTR").extends("BioEntity").reference("gene", "Gene").reference("chromosome", "Chromosome"))
        .class(ClassDescriptor::new("CDS").extends("BioEntity").reference("gene", "Gene"))
        .class(
            ClassDescriptor::new("Chromosome")
                .extends("BioEntity")
                .collection("exons", "Exon")
                .collection("genes", "Gene"),
        )
        .class(ClassDescriptor::new("ChromosomeBand").extends("BioEntity").reference("chromosome", "Chromosome"))
        .class(
            ClassDescriptor::new("Protein")
                .extends("BioEntity")
                .collection("genes", "Gene")
                .collection("interactions", "ProteinInteraction"),
        )
        .class(ClassDescriptor::new("Relation").reference("object", "BioEntity").reference("subject", "BioEntity"))
        .class(ClassDescriptor::new("SimpleRelation").extends("Relation"))
        .class(ClassDescriptor::new("RankedRelation").extends("Relation").attribute("rank"))
        .class(ClassDescriptor::new("Location").extends("Relation").attribute("start").attribute("end"))
        .class(ClassDescriptor::new("ProteinInteraction").extends("Relation").attribute("interactionType"))
        .class(ClassDescriptor::new("Orthologue").extends("Relation").attribute("score"))
        .class(ClassDescriptor::new("Annotation").reference("subject", "BioEntity").reference("property", "BioProperty"))
        .class(ClassDescriptor::new("BioProperty").attribute("identifier"))
        .class(ClassDescriptor::new("GOTerm").extends("BioProperty").attribute("name"))
        .class(ClassDescriptor::new("Phenotype").extends("BioProperty").attribute("description"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mrna_sees_transcript_and_bioentity_fields() {
        let schema = schema().unwrap();
        assert!(schema.is_a("MRNA", "BioEntity"));
        assert!(schema.field("MRNA", "exons").unwrap().is_collection());
        assert!(schema.field("MRNA", "subjects").unwrap().is_collection());
        assert!(schema.field("Transcript", "UTRs").is_none());
        assert_eq!(schema.declared_below("Transcript", "UTRs").unwrap().referenced_type.as_deref(), Some("UTR"));
    }

    #[test]
    fn relation_subclasses_are_relations() {
        let schema = schema().unwrap();
        for class in ["SimpleRelation", "RankedRelation", "Location", "ProteinInteraction", "Orthologue"] {
            assert!(schema.is_a(class, "Relation"), "{} is not a Relation", class);
            assert!(schema.field(class, "object").unwrap().is_reference());
        }
    }
}
