//! Table name classification.
//!
//! Three static name sets (geometry, result, matrix) plus a short list of
//! literal names with dedicated readers decide how each table is framed.
//! The sets are built once per process and never mutated.

use std::collections::HashSet;
use std::sync::OnceLock;

use log::debug;

use crate::op2::types::error::{Op2Error, Result};
use crate::op2::types::models::{SpecialTable, TableFamily};

const GEOMETRY_TABLES: &[&str] = &[
    "GEOM1", "GEOM2", "GEOM3", "GEOM4", "GEOM1S", "GEOM2S", "GEOM3S", "GEOM4S",
    "GEOM1N", "GEOM1VU", "GEOM2VU", "GEOM1OLD", "GEOM2OLD", "GEOM4OLD", "EPT", "EPTS",
    "EPTOLD", "EDTS", "MPT", "MPTS", "PVT0", "CASECC", "EDOM", "OGPFB1", "GPDT",
    "BGPDT", "BGPDTS", "BGPDTOLD", "DYNAMIC", "DYNAMICS", "EQEXIN", "EQEXINS", "ERRORN",
    "DESTAB", "R1TABRG", "HISADD", "BLAMA", "LAMA", "CLAMA", "ONRGY1", "OGPWG",
    "OGPWGM", "CONTACT", "VIEWTB", "KDICT", "PERF", "MONITOR",
];

const RESULT_TABLES: &[&str] = &[
    "RAPCONS", "RAQCONS", "RADCONS", "RASCONS", "RAFCONS", "RAECONS", "RANCONS",
    "RAGCONS", "RADEFFM", "RAPEATC", "RAQEATC", "RADEATC", "RASEATC", "RAFEATC",
    "RAEEATC", "RANEATC", "RAGEATC", "OES1X1", "OES1", "OES1X", "OES1C", "OESCP",
    "OESNLXR", "OESNLXD", "OESNLBR", "OESTRCP", "OESNL1X", "OESRT", "OSTR1X", "OSTR1C",
    "OEFIT", "OEF1X", "OEF1", "DOEF1", "OEF1MX", "OUGV1MX", "OQG1", "OQGV1", "OQMG1",
    "OQP1", "OUG1", "OUGV1", "BOUGV1", "OUPV1", "OUGV1PAT", "ROUGV1", "TOUGV1",
    "RSOUGV1", "RESOES1", "RESEF1", "OPNL1", "OPG1", "OPGV1", "OPG2", "OGS1", "OFMPF2M",
    "OSMPF2M", "OPMPF2M", "OLMPF2M", "OGPMPF2M", "OAGPSD2", "OAGCRM2", "OAGRMS2",
    "OAGATO2", "OAGNO2", "OESPSD2", "OESCRM2", "OESRMS2", "OESATO2", "OESNO2",
    "OEFPSD2", "OEFCRM2", "OEFRMS2", "OEFATO2", "OEFNO2", "OPGPSD2", "OPGCRM2",
    "OPGRMS2", "OPGATO2", "OPGNO2", "OQGPSD2", "OQGCRM2", "OQGRMS2", "OQGATO2",
    "OQGNO2", "OQMPSD2", "OQMCRM2", "OQMRMS2", "OQMATO2", "OQMNO2", "OUGPSD2",
    "OUGCRM2", "OUGRMS2", "OUGATO2", "OUGNO2", "OVGPSD2", "OVGCRM2", "OVGRMS2",
    "OVGATO2", "OVGNO2", "OSTRPSD2", "OSTRCRM2", "OSTRRMS2", "OSTRATO2", "OSTRNO2",
    "OCRUG", "OCRPG", "STDISP", "AEDISP", "MATPOOL", "CSTM", "AXIC", "BOPHIG", "HOEF1",
    "ONRGY2", "IBULK", "TOL", "DSCM2", "DESCYC", "DBCOPT", "PVT", "XSOP2DIR", "ONRGY",
    "DSCMCOL", "CONTACTS", "EDT", "EXTDB", "OQG2", "OBC1", "OBC2", "OBG1", "OES2",
    "OEF2", "OUGV2", "OSPDSI1", "OSPDS1", "OQGCF1", "OQGCF2", "OQGGF1", "OQGGF2",
    "OUGRMS1", "OESRMS1", "OUGNO1", "OESNO1", "OSPDSI2", "OSPDS2", "OSTR2", "OESNLXR2",
    "CMODEXT", "ROUGV2", "CDDATA", "OEKE1", "OES1MX", "OESNLBR2", "BGPDTVU", "OUG2T",
    "AEMONPT",
];

const MATRIX_TABLES: &[&str] = &[
    "EFMFSMS", "EFMASSS", "RBMASSS", "EFMFACS", "MPFACS", "MEFMASS", "MEFWTS", "TOLD",
    "SDT", "TOLB2", "ADSPT", "PMRT", "PFRT", "PGRT", "AFRT", "AGRT", "A",
    "AA", "AAP", "ADELUF", "ADELUS", "ADELX", "ADJG", "ADJGT", "ADRDUG",
    "AEDBUXV", "AEDW", "AEFRC", "AEIDW", "AEIPRE", "AEPRE", "AG", "AGD", "AGG", "AGX",
    "AH", "AJJT", "AM2", "AM3", "ANORM", "APART", "APIMAT", "APIMATT", "APL", "APPLOD",
    "APU", "ARVEC", "AUG1", "B", "B2DD", "B2GG", "B2PP", "BAA", "BACK", "BANDPV",
    "BASVEC", "BASVEC0", "BCONXI", "BCONXT", "BDD", "BDIAG", "BFEFE", "BFHH", "BHH",
    "BHH1", "BKK", "BP", "BPP", "BRDD", "BXX", "BUX", "C", "CDELB", "CDELK", "CDELM",
    "CFSAB", "CLAMMAT", "CLFMAT", "CMAT", "CMBXPHG", "CMSQE", "CMSTQE", "CNVTST", "CON",
    "CONS1T", "CONSBL", "CONTVDIF", "COORD", "COORDO", "CPH1", "CPH2", "CPHP", "CPHX",
    "CPHL", "CVAL", "CVALO", "CVALR", "CVALRG", "CVECT", "D", "D1JE", "D1JK", "D2JE",
    "D2JK", "DAR", "DBUG", "DCLDXT", "DELB1", "DELBSH", "DELCE", "DELDV", "DELF1",
    "DELFL", "DELGM", "DELGS", "DELS", "DELS1", "DELTGM", "DELVS", "DELWS", "DELX",
    "DELX1", "DESVCP", "DESVEC", "DESVECP", "DJX", "DM", "DPHG", "DPLDXI", "DPLDXT",
    "DRDUG", "DRDUGM", "DSCM", "DSCM2", "DSCMG", "DSCMR", "DSDIV", "DSEGM", "DSESM",
    "DSTABR", "DSTABU", "DUGNI", "DUX", "DXDXI", "DXDXIT", "E", "EFMASMTT", "EFMMCOL",
    "EFMMAT", "EGK", "EGM", "EGTX", "EGX", "EMAT", "EMM", "ENEMAT", "ENFLODB",
    "ENFLODK", "ENFLODM", "ENFMOTN", "ERHM", "EUHM", "EXCITEFX", "EXCITF", "EXCITP",
    "F", "F2J", "FFAJ", "FGNL", "FMPF", "FN", "FOLMAT", "FORE", "FREQMASS", "FRMDS",
    "GC", "GDGK", "GDKI", "GDKSKS", "GEG", "GLBRSP", "GLBRSPDS", "GM", "GMD", "GMNE",
    "GMS", "GOA", "GOD", "GPFMAT", "GPGK", "GPKH", "GPIK", "GPKE", "GPMPF", "GRDRM",
    "GS", "HMKT", "IFD", "IFG", "IFP", "IFS", "IFST", "IMAT", "IMATG", "K2DD", "K2GG",
    "K2PP", "K4AA", "K4KK", "K4XX", "KAA", "KAAL", "KDD", "KDICTDS", "KDICTX", "KFHH",
    "KFS", "KGG", "KGG1", "KGGNL", "KGGNL1", "KGGT", "KHH", "KHH1", "KKK", "KLL", "KLR",
    "KMM", "KNN", "KOO", "KPP", "KRDD", "KRFGG", "KRR", "KRZX", "KSAZX", "KSGG", "KSS",
    "KTTP", "KTTS", "KUX", "KXWAA", "KXX", "LAJJT", "LAM1DD", "LAMAM", "LAMMAT",
    "LCPHL", "LCPHP", "LCPHX", "LMPF", "LSCM", "LSEQ", "LTF", "M2DD", "M2GG", "M2PP",
    "MA", "MAA", "MABXWGG", "MAT", "MAT1", "MAT1N", "MAT2", "MAT2N", "MATS", "MATM",
    "MBSP", "MCHI", "MCHI2", "MDD", "MDUGNI", "MEA", "MEF", "MEM", "MES", "MEW",
    "MFEFE", "MFHH", "MGG", "MGGCOMB", "MHH", "MHH1", "MI", "MKK", "MKNRGY", "MLAM",
    "MLAM2", "MLL", "MLR", "MMP", "MNRGYMTF", "MOA", "MOO", "MPJN2O", "MPP", "MQG",
    "MR", "MRR", "MSNRGY", "MUG", "MUGNI", "MULNT", "MUPN", "MUX", "MXWAA", "MXX",
    "MZZ", "OTMT", "P2G", "PA", "PBYG", "PC1", "PD", "PDF", "PDT", "PDT1", "PFP", "PG",
    "PG1", "PGG", "PGRV", "PGT", "PGUP", "PGVST", "PHA", "PHA1", "PHAREF1", "PHASH2",
    "PHDFH", "PHDH", "PHF", "PHF1", "PHG", "PHG1", "PHGREF", "PHGREF1", "PHT", "PHX",
    "PHXL", "PHZ", "PJ", "PKF", "PKYG", "PL", "PLI", "PMPF", "PMYG", "PNL", "PNLT",
    "PO", "POI", "PPF", "PPL", "PPLT", "PPT", "PRBDOFS", "PROPI", "PROPO", "PS", "PSF",
    "PSI", "PST", "PUG", "PUGD", "PUGS", "PX", "PXA", "PXF", "PXT", "PXTDV", "PXT1",
    "PZ", "QG", "QHH", "QHHL", "QHJ", "QHJK", "QHJL", "QKH", "QKHL", "QLL", "QMG",
    "QMPF", "QPF", "QR", "QXX", "R", "R1VAL", "R1VALO", "R1VALR", "R1VALRG", "R2VAL",
    "R2VALO", "R2VALR", "R2VALRG", "R3VAL", "R3VALO", "R3VALR", "R3VALRG", "RBF",
    "RECM", "RDG", "RESMATFT", "RESMAX", "RESMAX0", "RGG", "RHMCF", "RMAT", "RMATG",
    "RMG", "RMG1", "RMPTQM", "RMSVAL", "RMSVALR", "RMSVLR", "RPH", "RPV", "RPX", "RQA",
    "RSPTQS", "RSTAB", "RUG", "RUL", "RUO", "SCLFMAT", "SEQMAP", "SHPVEC", "SKJ",
    "SLIST", "SMPF", "SNORMM", "SORTBOOL", "SRKS", "SRKT", "SVEC", "SYSE", "TR", "TRX",
    "UA", "UACCE", "UAJJT", "UAM1DD", "UD", "UD1", "UDISP", "UE", "UG", "UGD", "UGDS",
    "UGDS1", "UGG", "UGNI", "UGNT", "UGT", "MATMOD", "UGX", "UGX1", "UH", "UHF", "UHFF",
    "UHFS", "UI", "UL", "ULNT", "UNITDISP", "UO", "UOO", "UPF", "UPNL0", "UPNT", "UTF",
    "UVELO", "UX", "UXDIFV", "UXF", "UXR", "UXT", "UXT1", "UXU", "UXV", "UXVBRL",
    "UXVF", "UXVP", "UXVST", "UXVW", "VA", "VG", "VGD", "WGTM", "WJ", "WRJVBRL",
    "WSKJF", "XAA", "XD", "XDD", "XDICT", "XDICTB", "XDICTDS", "XDICTX", "XG", "XGG",
    "XH", "XINIT", "XJJ", "XO", "XORTH", "XP", "XPP", "SOLVIT", "XSF", "XSS", "XZ",
    "YACCE", "YPF", "YPO", "YPT", "YS", "YS0", "YSD", "YVELO", "Z1ZX", "ZZX",
];
static GEOMETRY_SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
static RESULT_SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
static MATRIX_SET: OnceLock<HashSet<&'static str>> = OnceLock::new();

/// Names of tables framed as geometry tables.
pub fn geometry_tables() -> &'static HashSet<&'static str> {
    GEOMETRY_SET.get_or_init(|| GEOMETRY_TABLES.iter().copied().collect())
}

/// Names of tables framed as result tables.
pub fn result_tables() -> &'static HashSet<&'static str> {
    RESULT_SET.get_or_init(|| RESULT_TABLES.iter().copied().collect())
}

/// Names of tables decoded as matrices.
pub fn matrix_tables() -> &'static HashSet<&'static str> {
    MATRIX_SET.get_or_init(|| MATRIX_TABLES.iter().copied().collect())
}

/// Literal names with a dedicated reader.
pub fn special_table(name: &str) -> Option<SpecialTable> {
    let special = match name {
        "GPL" => SpecialTable::Gpl,
        "MEFF" => SpecialTable::Meff,
        "INTMOD" => SpecialTable::Intmod,
        "FRL" => SpecialTable::Frl,
        "EXTDB" => SpecialTable::Extdb,
        "BHH" | "KHH" => SpecialTable::Bhh,
        "OMM2" => SpecialTable::Omm2,
        "DIT" => SpecialTable::Dit,
        "KELM" => SpecialTable::Kelm,
        "PCOMPTS" => SpecialTable::Pcompts,
        "FOL" => SpecialTable::Fol,
        "SDF" | "PMRF" => SpecialTable::Sdf,
        _ => return None,
    };
    Some(special)
}

/// Caller-controlled escape hatches for names outside the static sets.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    pub additional_matrices: &'a HashSet<String>,
    pub skip_unknown_matrices: bool,
}

impl Classifier<'_> {
    /// Decide the family of `name`.
    ///
    /// Priority: geometry set, special literals, matrix set, result set,
    /// then the "skip unknown matrices" flag and the additional matrix names.
    ///
    /// # Errors
    /// [`Op2Error::UnclassifiedTable`] if nothing matches.
    pub fn classify(&self, name: &str) -> Result<TableFamily> {
        let family = if geometry_tables().contains(name) {
            TableFamily::Geometry
        } else if let Some(special) = special_table(name) {
            TableFamily::Special(special)
        } else if matrix_tables().contains(name) {
            TableFamily::Matrix
        } else if result_tables().contains(name) {
            TableFamily::Result
        } else if self.skip_unknown_matrices {
            debug!("{:?} is unknown; reading it as a matrix", name);
            TableFamily::Matrix
        } else if self.additional_matrices.contains(name.trim()) {
            TableFamily::Matrix
        } else {
            return Err(Op2Error::UnclassifiedTable(name.to_string()));
        };
        Ok(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict(extra: &HashSet<String>) -> Classifier<'_> {
        Classifier {
            additional_matrices: extra,
            skip_unknown_matrices: false,
        }
    }

    #[test]
    fn static_names_always_classify() {
        let extra = HashSet::new();
        let classifier = strict(&extra);
        for name in geometry_tables() {
            assert_eq!(classifier.classify(name).unwrap(), TableFamily::Geometry, "{}", name);
        }
        for name in matrix_tables().iter().chain(result_tables()) {
            let family = classifier.classify(name).unwrap();
            assert_eq!(family, classifier.classify(name).unwrap());
            assert_ne!(family, TableFamily::Geometry, "{}", name);
        }
    }

    #[test]
    fn special_literals_win_over_matrix_and_result_sets() {
        let extra = HashSet::new();
        let classifier = strict(&extra);
        assert!(matrix_tables().contains("BHH"));
        assert_eq!(
            classifier.classify("BHH").unwrap(),
            TableFamily::Special(SpecialTable::Bhh)
        );
        assert!(result_tables().contains("EXTDB"));
        assert_eq!(
            classifier.classify("EXTDB").unwrap(),
            TableFamily::Special(SpecialTable::Extdb)
        );
        assert_eq!(classifier.classify("DSCM2").unwrap(), TableFamily::Matrix);
    }

    #[test]
    fn unknown_names_need_an_escape_hatch() {
        let mut extra = HashSet::new();
        assert!(matches!(
            strict(&extra).classify("MYMAT"),
            Err(Op2Error::UnclassifiedTable(name)) if name == "MYMAT"
        ));

        extra.insert("MYMAT".to_string());
        assert_eq!(strict(&extra).classify("MYMAT").unwrap(), TableFamily::Matrix);

        let none = HashSet::new();
        let lenient = Classifier {
            additional_matrices: &none,
            skip_unknown_matrices: true,
        };
        assert_eq!(lenient.classify("ANYTHING").unwrap(), TableFamily::Matrix);
    }
}
