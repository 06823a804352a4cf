use std::{collections::HashMap, path::Path};

use log::info;

use crate::utils::files::read_file;

use super::{Lineage, Rank, Taxon, TaxonomyError};

/// Field separator used by NCBI taxdump files
static SEPARATOR: &str = "\t|\t";

/// Upper bound on ancestor walks, guarding against cycles in a damaged dump
const MAX_DEPTH: usize = 256;

/// An NCBI taxonomy tree loaded from `nodes.dmp` and `names.dmp`
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    /// Parent id and rank name for each taxid
    nodes: HashMap<u32, (u32, String)>,

    /// Scientific name for each taxid
    names: HashMap<u32, String>,
}

impl Taxonomy {
    /// Load `nodes.dmp` and `names.dmp` from a taxdump directory
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, TaxonomyError> {
        let dir = dir.as_ref();

        let nodes = read_file(dir.join("nodes.dmp")).await?;
        let names = read_file(dir.join("names.dmp")).await?;

        let taxonomy = Self::from_dumps(&nodes, &names)?;

        info!(
            "Loaded {} taxonomy nodes from {}",
            taxonomy.len(),
            dir.display()
        );

        Ok(taxonomy)
    }

    /// Parse taxdump lines
    pub fn from_dumps<N, M>(nodes: &[N], names: &[M]) -> Result<Self, TaxonomyError>
    where
        N: AsRef<str>,
        M: AsRef<str>,
    {
        let mut taxonomy = Self::default();

        for (i, line) in nodes.iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.trim_end_matches("\t|").split(SEPARATOR).collect();
            if parts.len() < 3 {
                return Err(malformed("nodes.dmp", i, "expected at least 3 fields"));
            }

            let taxid = parse_id(parts[0], "nodes.dmp", i)?;
            let parent = parse_id(parts[1], "nodes.dmp", i)?;

            taxonomy
                .nodes
                .insert(taxid, (parent, parts[2].trim().to_string()));
        }

        for (i, line) in names.iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.trim_end_matches("\t|").split(SEPARATOR).collect();
            if parts.len() < 4 {
                return Err(malformed("names.dmp", i, "expected at least 4 fields"));
            }

            // Only scientific names identify a taxon
            if parts[3].trim() != "scientific name" {
                continue;
            }

            let taxid = parse_id(parts[0], "names.dmp", i)?;
            taxonomy.names.insert(taxid, parts[1].to_string());
        }

        Ok(taxonomy)
    }

    /// Insert a single node, mainly for building small trees by hand
    pub fn insert(&mut self, taxid: u32, parent: u32, rank: &str, name: &str) {
        self.nodes.insert(taxid, (parent, rank.to_string()));
        self.names.insert(taxid, name.to_string());
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the taxonomy has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The scientific name of a taxid
    pub fn name(&self, taxid: u32) -> Option<&str> {
        self.names.get(&taxid).map(String::as_str)
    }

    /// The ancestors of a taxid, starting with the taxid itself and ending at the root
    pub fn ancestors(&self, taxid: u32) -> Vec<u32> {
        let mut lineage = Vec::new();
        let mut current = taxid;

        while let Some((parent, _)) = self.nodes.get(&current) {
            lineage.push(current);

            if *parent == current || lineage.len() >= MAX_DEPTH {
                break;
            }

            current = *parent;
        }

        lineage
    }
}

impl Lineage for Taxonomy {
    fn ranks(&self, taxid: u32, ranks: &[Rank]) -> Vec<Taxon> {
        let mut by_rank: HashMap<&str, u32> = HashMap::new();

        for ancestor in self.ancestors(taxid) {
            if let Some((_, rank)) = self.nodes.get(&ancestor) {
                // The closest ancestor wins should a rank repeat
                by_rank.entry(rank.as_str()).or_insert(ancestor);
            }
        }

        ranks
            .iter()
            .map(|rank| match by_rank.get(rank.as_str()) {
                Some(taxid) => Taxon {
                    taxid: Some(*taxid),
                    name: self
                        .name(*taxid)
                        .map(str::to_string)
                        .unwrap_or_else(|| taxid.to_string()),
                },
                None => Taxon::unknown(),
            })
            .collect()
    }
}

fn parse_id(field: &str, file: &str, index: usize) -> Result<u32, TaxonomyError> {
    field
        .trim()
        .parse()
        .map_err(|e| malformed(file, index, &format!("invalid taxid {:?}: {}", field, e)))
}

fn malformed(file: &str, index: usize, reason: &str) -> TaxonomyError {
    TaxonomyError::Malformed {
        file: file.to_string(),
        line: index + 1,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// A tiny tree with two bacterial families, a virus with no kingdom, and a fungus
    pub(crate) fn sample_taxonomy() -> Taxonomy {
        let nodes = [
            "1\t|\t1\t|\tno rank\t|",
            "2\t|\t131567\t|\tsuperkingdom\t|",
            "131567\t|\t1\t|\tcellular organisms\t|",
            "543\t|\t2\t|\tfamily\t|",
            "562\t|\t543\t|\tspecies\t|",
            "1224\t|\t2\t|\tfamily\t|",
            "287\t|\t1224\t|\tspecies\t|",
            "10239\t|\t1\t|\tsuperkingdom\t|",
            "11308\t|\t10239\t|\tfamily\t|",
            "11320\t|\t11308\t|\tspecies\t|",
            "2759\t|\t131567\t|\tsuperkingdom\t|",
            "4751\t|\t2759\t|\tkingdom\t|",
            "4893\t|\t4751\t|\tfamily\t|",
            "4932\t|\t4893\t|\tspecies\t|",
        ];
        let names = [
            "1\t|\troot\t|\t\t|\tscientific name\t|",
            "2\t|\tBacteria\t|\tBacteria <bacteria>\t|\tscientific name\t|",
            "2\t|\teubacteria\t|\t\t|\tgenbank common name\t|",
            "543\t|\tEnterobacteriaceae\t|\t\t|\tscientific name\t|",
            "562\t|\tEscherichia coli\t|\t\t|\tscientific name\t|",
            "1224\t|\tPseudomonadaceae\t|\t\t|\tscientific name\t|",
            "287\t|\tPseudomonas aeruginosa\t|\t\t|\tscientific name\t|",
            "10239\t|\tViruses\t|\t\t|\tscientific name\t|",
            "11308\t|\tOrthomyxoviridae\t|\t\t|\tscientific name\t|",
            "11320\t|\tInfluenza A virus\t|\t\t|\tscientific name\t|",
            "2759\t|\tEukaryota\t|\t\t|\tscientific name\t|",
            "4751\t|\tFungi\t|\t\t|\tscientific name\t|",
            "4893\t|\tSaccharomycetaceae\t|\t\t|\tscientific name\t|",
            "4932\t|\tSaccharomyces cerevisiae\t|\t\t|\tscientific name\t|",
        ];

        Taxonomy::from_dumps(&nodes, &names).expect("sample taxonomy should parse")
    }

    fn names(taxa: Vec<Taxon>) -> Vec<String> {
        taxa.into_iter().map(|taxon| taxon.name).collect()
    }

    #[test]
    fn test_resolves_ranks() {
        let taxonomy = sample_taxonomy();

        let taxa = taxonomy.ranks(562, &[Rank::Superkingdom, Rank::Kingdom, Rank::Family]);

        assert_eq!(taxa[0].taxid, Some(2));
        assert_eq!(names(taxa), vec!["Bacteria", "unknown", "Enterobacteriaceae"]);
    }

    #[test]
    fn test_only_scientific_names_are_kept() {
        let taxonomy = sample_taxonomy();

        assert_eq!(taxonomy.name(2), Some("Bacteria"));
    }

    #[test]
    fn test_unknown_taxid() {
        let taxonomy = sample_taxonomy();

        let taxa = taxonomy.ranks(999_999, &[Rank::Superkingdom, Rank::Family]);

        assert_eq!(taxa, vec![Taxon::unknown(), Taxon::unknown()]);
    }

    #[test]
    fn test_ancestors_end_at_root() {
        let taxonomy = sample_taxonomy();

        assert_eq!(taxonomy.ancestors(4932), vec![4932, 4893, 4751, 2759, 131567, 1]);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut taxonomy = Taxonomy::default();
        taxonomy.insert(10, 11, "family", "A");
        taxonomy.insert(11, 10, "superkingdom", "B");

        let taxa = taxonomy.ranks(10, &[Rank::Superkingdom, Rank::Family]);

        assert_eq!(names(taxa), vec!["B", "A"]);
        assert_eq!(taxonomy.ancestors(10).len(), MAX_DEPTH);
    }

    #[test]
    fn test_malformed_taxid_reports_line() {
        let nodes = ["1\t|\t1\t|\tno rank\t|", "x\t|\t1\t|\tspecies\t|"];
        let names: [&str; 0] = [];

        match Taxonomy::from_dumps(&nodes, &names) {
            Err(TaxonomyError::Malformed { file, line, .. }) => {
                assert_eq!(file, "nodes.dmp");
                assert_eq!(line, 2);
            }
            other => panic!("expected a malformed line error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("nodes.dmp"),
            "1\t|\t1\t|\tno rank\t|\n2\t|\t1\t|\tsuperkingdom\t|\n",
        )
        .expect("write nodes");
        std::fs::write(
            dir.path().join("names.dmp"),
            "1\t|\troot\t|\t\t|\tscientific name\t|\n2\t|\tBacteria\t|\t\t|\tscientific name\t|\n",
        )
        .expect("write names");

        let taxonomy = Taxonomy::load(dir.path()).await.expect("taxonomy loads");

        assert_eq!(taxonomy.len(), 2);
        assert_eq!(names(taxonomy.ranks(2, &[Rank::Superkingdom])), vec!["Bacteria"]);
    }
}
