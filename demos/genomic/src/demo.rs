use refmat::{AppError, EntityId, EntityRecord, EntityStore, WriteTx};
use std::collections::BTreeMap;

pub const CHROMOSOME_2L: EntityId = EntityId(1);
pub const BAND_21A1: EntityId = EntityId(2);
pub const GENE_ZEN: EntityId = EntityId(10);
pub const GENE_BCD: EntityId = EntityId(11);
pub const MRNA_ZEN_RA: EntityId = EntityId(20);
pub const MRNA_BCD_RA: EntityId = EntityId(21);
pub const EXON_ZEN_1: EntityId = EntityId(30);
pub const EXON_ZEN_2: EntityId = EntityId(31);
pub const EXON_BCD_1: EntityId = EntityId(32);
pub const INTRON_ZEN_1: EntityId = EntityId(35);
pub const UTR_ZEN: EntityId = EntityId(40);
pub const CDS_ZEN: EntityId = EntityId(45);
pub const PROTEIN_ZEN: EntityId = EntityId(50);
pub const PROTEIN_BCD: EntityId = EntityId(51);
pub const GO_DNA_BINDING: EntityId = EntityId(60);
pub const PHENOTYPE_LETHAL: EntityId = EntityId(61);
pub const ANNOTATION_ZEN_GO: EntityId = EntityId(70);
pub const ANNOTATION_BCD_PHENOTYPE: EntityId = EntityId(71);
pub const ANNOTATION_BCD_PROTEIN_PHENOTYPE: EntityId = EntityId(72);
pub const INTERACTION_ZEN_BCD: EntityId = EntityId(120);
pub const ORTHOLOGUE_ZEN_BCD: EntityId = EntityId(130);
pub const ORTHOLOGUE_BCD_ZEN: EntityId = EntityId(131);

/// Loader output for the demo graph. Relations are registered on both ends the way the
/// loaders do it, `subjects` of the object and `objects` of the subject.
#[derive(Default)]
pub struct Fixture {
    records: BTreeMap<EntityId, EntityRecord>,
}

impl Fixture {
    pub fn entity(mut self, record: EntityRecord) -> Self {
        self.records.insert(record.id, record);
        self
    }

    pub fn relate(mut self, id: EntityId, class: &str, object: EntityId, subject: EntityId) -> Self {
        self.push(object, "subjects", id);
        self.push(subject, "objects", id);
        self.entity(EntityRecord::new(id, class).reference("object", object).reference("subject", subject))
    }

    pub fn annotate(mut self, id: EntityId, subject: EntityId, property: EntityId) -> Self {
        self.push(subject, "annotations", id);
        self.entity(EntityRecord::new(id, "Annotation").reference("subject", subject).reference("property", property))
    }

    fn push(&mut self, id: EntityId, field: &str, member: EntityId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.collections.entry(field.to_string()).or_default().push(member);
        }
    }

    pub fn records(self) -> Vec<EntityRecord> {
        self.records.into_values().collect()
    }

    /// Stores every record in one transaction.
    pub fn load<S: EntityStore>(self, store: &S) -> Result<usize, AppError> {
        let records = self.records();
        let mut tx = store.begin_transaction()?;
        for record in &records {
            tx.store(record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }
}

/// Two genes on one chromosome arm with their transcripts, exons, proteins and annotations,
/// plus an interaction and a pair of orthologues between them.
pub fn graph() -> Fixture {
    Fixture::default()
        .entity(EntityRecord::new(CHROMOSOME_2L, "Chromosome").attribute("identifier", "2L"))
        .entity(EntityRecord::new(BAND_21A1, "ChromosomeBand").attribute("identifier", "21A1"))
        .entity(EntityRecord::new(GENE_ZEN, "Gene").attribute("identifier", "zen"))
        .entity(EntityRecord::new(GENE_BCD, "Gene").attribute("identifier", "bcd"))
        .entity(
            EntityRecord::new(MRNA_ZEN_RA, "MRNA")
                .attribute("identifier", "zen-RA")
                .reference("protein", PROTEIN_ZEN)
                .collection("UTRs", vec![UTR_ZEN])
                .collection("CDSs", vec![CDS_ZEN]),
        )
        .entity(EntityRecord::new(MRNA_BCD_RA, "MRNA").attribute("identifier", "bcd-RA").reference("protein", PROTEIN_BCD))
        .entity(EntityRecord::new(EXON_ZEN_1, "Exon").attribute("identifier", "zen:1"))
        .entity(EntityRecord::new(EXON_ZEN_2, "Exon").attribute("identifier", "zen:2"))
        .entity(EntityRecord::new(EXON_BCD_1, "Exon").attribute("identifier", "bcd:1"))
        .entity(EntityRecord::new(INTRON_ZEN_1, "Intron").attribute("identifier", "zen-in1"))
        .entity(EntityRecord::new(UTR_ZEN, "UTR").attribute("identifier", "zen-5'UTR"))
        .entity(EntityRecord::new(CDS_ZEN, "CDS").attribute("identifier", "zen-CDS"))
        .entity(EntityRecord::new(PROTEIN_ZEN, "Protein").attribute("identifier", "ZEN_DROME"))
        .entity(EntityRecord::new(PROTEIN_BCD, "Protein").attribute("identifier", "BCD_DROME"))
        .entity(EntityRecord::new(GO_DNA_BINDING, "GOTerm").attribute("identifier", "GO:0003677").attribute("name", "DNA binding"))
        .entity(EntityRecord::new(PHENOTYPE_LETHAL, "Phenotype").attribute("identifier", "lethal"))
        .annotate(ANNOTATION_ZEN_GO, PROTEIN_ZEN, GO_DNA_BINDING)
        .annotate(ANNOTATION_BCD_PHENOTYPE, GENE_BCD, PHENOTYPE_LETHAL)
        .annotate(ANNOTATION_BCD_PROTEIN_PHENOTYPE, PROTEIN_BCD, PHENOTYPE_LETHAL)
        .relate(EntityId(100), "RankedRelation", MRNA_ZEN_RA, EXON_ZEN_1)
        .relate(EntityId(101), "SimpleRelation", MRNA_ZEN_RA, EXON_ZEN_2)
        .relate(EntityId(102), "SimpleRelation", MRNA_BCD_RA, EXON_BCD_1)
        .relate(EntityId(103), "SimpleRelation", MRNA_ZEN_RA, INTRON_ZEN_1)
        .relate(EntityId(104), "SimpleRelation", GENE_ZEN, MRNA_ZEN_RA)
        .relate(EntityId(105), "SimpleRelation", GENE_BCD, MRNA_BCD_RA)
        .relate(EntityId(110), "Location", CHROMOSOME_2L, EXON_ZEN_1)
        .relate(EntityId(111), "Location", CHROMOSOME_2L, EXON_ZEN_2)
        .relate(EntityId(112), "Location", CHROMOSOME_2L, EXON_BCD_1)
        .relate(EntityId(113), "Location", CHROMOSOME_2L, BAND_21A1)
        .relate(EntityId(114), "Location", CHROMOSOME_2L, UTR_ZEN)
        .relate(INTERACTION_ZEN_BCD, "ProteinInteraction", PROTEIN_ZEN, PROTEIN_BCD)
        .relate(ORTHOLOGUE_ZEN_BCD, "Orthologue", GENE_ZEN, GENE_BCD)
        .relate(ORTHOLOGUE_BCD_ZEN, "Orthologue", GENE_BCD, GENE_ZEN)
}
