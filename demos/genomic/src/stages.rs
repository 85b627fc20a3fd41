use refmat::{Cardinality, DerivedEdgeSpec, GroupBy, Pipeline, ReplicateSpec};

/// Collection of the lead `source_type` filled through a field path, the reverse side of a
/// single reference derived on the same path.
fn collect_via(
    source_type: &str,
    source_field: &str,
    connecting_type: &str,
    connecting_field: &str,
    destination_type: &str,
    target_field: &str,
) -> DerivedEdgeSpec {
    DerivedEdgeSpec::via_field_path(source_type, source_field, connecting_type, connecting_field, destination_type, target_field)
        .named(&format!("{}.{}", source_type, target_field))
        .grouped_by(GroupBy::Source)
        .with_cardinality(Cardinality::Collection)
}

/// Transcript/exon and mRNA/intron collections from the relation objects.
pub fn stage_1() -> Pipeline {
    Pipeline::new("stage 1")
        .materialize(DerivedEdgeSpec::via_relation("Transcript", "RankedRelation", "Exon", "exons"))
        .materialize(DerivedEdgeSpec::via_relation("Transcript", "SimpleRelation", "Exon", "exons").merging())
        .materialize(DerivedEdgeSpec::via_relation("MRNA", "SimpleRelation", "Intron", "introns"))
        .materialize(
            DerivedEdgeSpec::via_relation("Transcript", "Relation", "Exon", "transcripts")
                .named("Exon.transcripts")
                .grouped_by(GroupBy::Destination),
        )
        .materialize(
            DerivedEdgeSpec::via_relation("MRNA", "SimpleRelation", "Intron", "MRNAs")
                .named("Intron.MRNAs")
                .grouped_by(GroupBy::Destination),
        )
}

/// Transcript.gene and Gene.transcripts
pub fn stage_2() -> Pipeline {
    Pipeline::new("stage 2")
        .materialize(DerivedEdgeSpec::via_field_path("Gene", "subjects", "SimpleRelation", "subject", "Transcript", "gene"))
        .materialize(collect_via("Gene", "subjects", "SimpleRelation", "subject", "Transcript", "transcripts"))
}

/// Exon.chromosome and Chromosome.exons
pub fn stage_3() -> Pipeline {
    Pipeline::new("stage 3")
        .materialize(DerivedEdgeSpec::via_field_path("Chromosome", "subjects", "Location", "subject", "Exon", "chromosome"))
        .materialize(collect_via("Chromosome", "subjects", "Location", "subject", "Exon", "exons"))
}

pub fn stage_4() -> Pipeline {
    Pipeline::new("stage 4")
        .materialize(DerivedEdgeSpec::via_field_path("Chromosome", "subjects", "Location", "subject", "ChromosomeBand", "chromosome"))
}

/// Exon.gene and Gene.exons, needs Gene.transcripts from stage 2.
pub fn stage_5() -> Pipeline {
    Pipeline::new("stage 5")
        .materialize(DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "exons", "Exon", "gene"))
        .materialize(collect_via("Gene", "transcripts", "Transcript", "exons", "Exon", "exons"))
}

pub fn stage_6() -> Pipeline {
    Pipeline::new("stage 6")
        .materialize(DerivedEdgeSpec::via_field_path("Gene", "transcripts", "MRNA", "UTRs", "UTR", "gene"))
        .materialize(collect_via("Gene", "transcripts", "MRNA", "UTRs", "UTR", "UTRs"))
        .materialize(DerivedEdgeSpec::via_field_path("Chromosome", "subjects", "Location", "subject", "UTR", "chromosome"))
}

/// Gene.chromosome and Chromosome.genes through the exons located on the chromosome.
pub fn stage_7() -> Pipeline {
    Pipeline::new("stage 7")
        .materialize(DerivedEdgeSpec::via_field_path("Chromosome", "exons", "Exon", "gene", "Gene", "chromosome"))
        .materialize(collect_via("Chromosome", "exons", "Exon", "gene", "Gene", "genes"))
}

pub fn stage_8() -> Pipeline {
    Pipeline::new("stage 8")
        .materialize(DerivedEdgeSpec::via_field_path("Chromosome", "exons", "Exon", "transcripts", "Transcript", "chromosome"))
}

/// Protein.genes and Gene.proteins from the loaded Transcript.protein, then CDS.gene.
pub fn stage_9() -> Pipeline {
    Pipeline::new("stage 9")
        .materialize(
            DerivedEdgeSpec::via_field_path("Gene", "transcripts", "Transcript", "protein", "Protein", "genes")
                .with_cardinality(Cardinality::Collection),
        )
        .materialize(collect_via("Gene", "transcripts", "Transcript", "protein", "Protein", "proteins"))
        .materialize(DerivedEdgeSpec::via_field_path("Gene", "transcripts", "MRNA", "CDSs", "CDS", "gene"))
        .materialize(collect_via("Gene", "transcripts", "MRNA", "CDSs", "CDS", "CDSs"))
}

pub fn stage_10() -> Pipeline {
    Pipeline::new("stage 10")
        .materialize(DerivedEdgeSpec::via_collection("Protein", "subjects", "ProteinInteraction", "interactions"))
}

/// Interactions the protein is the subject of join the ones from stage 10.
pub fn stage_11() -> Pipeline {
    Pipeline::new("stage 11").materialize(
        DerivedEdgeSpec::via_collection("Protein", "objects", "ProteinInteraction", "interactions")
            .named("Protein.interactions (objects)")
            .merging(),
    )
}

/// GO annotations of proteins copied onto their genes, then Gene.annotations picks the copies up.
pub fn stage_12() -> Pipeline {
    let annotations = DerivedEdgeSpec::via_field_path("Gene", "proteins", "Protein", "annotations", "Annotation", "annotations")
        .grouped_by(GroupBy::Source)
        .with_cardinality(Cardinality::Collection);
    Pipeline::new("stage 12")
        .replicate(ReplicateSpec::new("Gene annotations from proteins", annotations, "subject").only_when("property", "GOTerm"))
        .materialize(
            DerivedEdgeSpec::via_collection("Annotation", "subject", "Gene", "annotations")
                .named("Gene.annotations")
                .grouped_by(GroupBy::Destination)
                .merging(),
        )
}

pub fn stage_13() -> Pipeline {
    Pipeline::new("stage 13").materialize(collect_via("Gene", "annotations", "Annotation", "property", "GOTerm", "GOTerms"))
}

pub fn stage_14() -> Pipeline {
    Pipeline::new("stage 14").materialize(collect_via("Gene", "annotations", "Annotation", "property", "Phenotype", "phenotypes"))
}

/// All reference passes in dependency order, with whole-store statistics checkpoints after
/// stages 9, 11, 12 and 14.
pub fn insert_references() -> Pipeline {
    Pipeline::new("insert_references")
        .then(stage_1())
        .then(stage_2())
        .then(stage_3())
        .then(stage_4())
        .then(stage_5())
        .then(stage_6())
        .then(stage_7())
        .then(stage_8())
        .then(stage_9())
        .checkpoint()
        .then(stage_10())
        .then(stage_11())
        .checkpoint()
        .then(stage_12())
        .checkpoint()
        .then(stage_13())
        .then(stage_14())
        .checkpoint()
}

/// Gene.orthologues, run once orthologue relations are loaded and `insert_references` is done.
pub fn populate_orthologues() -> Pipeline {
    Pipeline::new("populate_orthologues")
        .materialize(DerivedEdgeSpec::via_collection("Gene", "subjects", "Orthologue", "orthologues"))
}
