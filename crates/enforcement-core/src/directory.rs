use serde::Serialize;

/// One sub-county with its named role-holders and ordered ward list.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SubCounty {
    pub name: &'static str,
    pub administrator: &'static str,
    pub commander: &'static str,
    pub environment_officer: &'static str,
    pub planning_officer: &'static str,
    pub wards: &'static [&'static str],
}

impl SubCounty {
    #[must_use]
    pub fn has_ward(&self, ward: &str) -> bool {
        self.wards.iter().any(|candidate| *candidate == ward)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AdministrativeUnit {
    pub borough: &'static str,
    pub manager: &'static str,
    pub sub_counties: &'static [SubCounty],
}

const NAIROBI_UNITS: &[AdministrativeUnit] = &[
    AdministrativeUnit {
        borough: "Western",
        manager: "Janet Waeni Kimeu",
        sub_counties: &[
            SubCounty {
                name: "Westlands",
                administrator: "Florence Ambia Shikaga",
                commander: "Peter Otieno Owino",
                environment_officer: "Mercy Amoa",
                planning_officer: "John Mbuthia",
                wards: &["Kitisuru", "Parklands", "Karura", "Kangemi", "Mt. View"],
            },
            SubCounty {
                name: "Dagoretti North",
                administrator: "Jane Ndanu Kyarungu",
                commander: "Wiclif Walera",
                environment_officer: "Salome W. Gitua",
                planning_officer: "Waweru Kindiga",
                wards: &["Kilimani", "Kawangware", "Gatina", "Kileleshwa", "Kabiro"],
            },
        ],
    },
    AdministrativeUnit {
        borough: "Southern",
        manager: "Dabasso Luka Wario",
        sub_counties: &[
            SubCounty {
                name: "Dagoretti South",
                administrator: "Edward Musuni",
                commander: "Fredrick Maritim",
                environment_officer: "David K. Macharia",
                planning_officer: "Conslate Adhiambo",
                wards: &["Mutuini", "Ngando", "Riruta", "Uthiru/Ruthimitu", "Waithaka"],
            },
            SubCounty {
                name: "Langata",
                administrator: "Ag. Nelly Ayoti",
                commander: "Priscilla Maneno",
                environment_officer: "Antony Baka",
                planning_officer: "Beatrice Kimathi",
                wards: &["Karen", "Nairobi West", "Mugumoini", "South C", "Nyayo Highrise"],
            },
            SubCounty {
                name: "Kibra",
                administrator: "Calvince Otieno Okello",
                commander: "Jane Talam",
                environment_officer: "Enos Chetambe",
                planning_officer: "Sylvia Mwikali",
                wards: &["Laini Saba", "Lindi", "Makina", "Woodley/K Golf C.", "Sarangombe"],
            },
        ],
    },
    AdministrativeUnit {
        borough: "Northern",
        manager: "John Saruni",
        sub_counties: &[
            SubCounty {
                name: "Roysambu",
                administrator: "Ronald O. Mulema",
                commander: "Cecilia Mwaura",
                environment_officer: "Meryvine Nyanchoka",
                planning_officer: "Albert Matundura",
                wards: &["Githurai", "Kahawa West", "Zimmerman", "Roysambu", "Kahawa"],
            },
            SubCounty {
                name: "Kasarani",
                administrator: "Ag. Elizabeth Kyalungu",
                commander: "Michael Mbuthia",
                environment_officer: "Ayala Powell Aporo",
                planning_officer: "Michael Agoya",
                wards: &["Clay City", "Mwiki", "Kasarani", "Njiru", "Ruai"],
            },
            SubCounty {
                name: "Ruaraka",
                administrator: "Jazz Kemunto",
                commander: "Alphonse Kamau",
                environment_officer: "Ruth Mwendwa",
                planning_officer: "Robert Chelino",
                wards: &["Babadogo", "Utalii", "Mathare North", "Lucky Summer", "Korogocho"],
            },
        ],
    },
    AdministrativeUnit {
        borough: "Eastern",
        manager: "George Muca",
        sub_counties: &[
            SubCounty {
                name: "Embakasi Central",
                administrator: "Eston Kiyai",
                commander: "Josiah Agina",
                environment_officer: "Richard Langat",
                planning_officer: "Josphat Mburu",
                wards: &[
                    "Kayole North",
                    "Kayole Central",
                    "Kayole South",
                    "Komarock",
                    "Matopeni/Spring V.",
                ],
            },
            SubCounty {
                name: "Embakasi West",
                administrator: "Jane Ngima Munyiri",
                commander: "George Gachara",
                environment_officer: "Christine Kizibi",
                planning_officer: "Faith Kibet",
                wards: &["Umoja I", "Umoja II", "Mowlem", "Kariobangi South"],
            },
            SubCounty {
                name: "Embakasi North",
                administrator: "Francis Nyandago",
                commander: "George Nyasimi",
                environment_officer: "Julia Muchoki",
                planning_officer: "Roy Misiko",
                wards: &[
                    "Kariobangi North",
                    "Dandora Area I",
                    "Dandora Area II",
                    "Dandora Area III",
                    "Dandora Area IV",
                ],
            },
        ],
    },
];

/// Read-only borough -> sub-county -> ward hierarchy.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AdministrativeDirectory {
    units: &'static [AdministrativeUnit],
}

impl Default for AdministrativeDirectory {
    fn default() -> Self {
        Self::nairobi()
    }
}

impl AdministrativeDirectory {
    /// The county's published re-organization of executive and administration units.
    #[must_use]
    pub fn nairobi() -> Self {
        Self { units: NAIROBI_UNITS }
    }

    #[must_use]
    pub fn units(&self) -> &'static [AdministrativeUnit] {
        self.units
    }

    #[must_use]
    pub fn borough(&self, name: &str) -> Option<&'static AdministrativeUnit> {
        self.units.iter().find(|unit| unit.borough == name)
    }

    #[must_use]
    pub fn sub_county(&self, name: &str) -> Option<&'static SubCounty> {
        self.sub_counties().find(|sub_county| sub_county.name == name)
    }

    #[must_use]
    pub fn borough_of(&self, sub_county: &str) -> Option<&'static AdministrativeUnit> {
        self.units
            .iter()
            .find(|unit| unit.sub_counties.iter().any(|candidate| candidate.name == sub_county))
    }

    #[must_use]
    pub fn wards(&self, sub_county: &str) -> Option<&'static [&'static str]> {
        self.sub_county(sub_county).map(|found| found.wards)
    }

    #[must_use]
    pub fn planning_officer(&self, sub_county: &str) -> Option<&'static str> {
        self.sub_county(sub_county).map(|found| found.planning_officer)
    }

    pub fn sub_counties(&self) -> impl Iterator<Item = &'static SubCounty> {
        self.units.iter().flat_map(|unit| unit.sub_counties.iter())
    }

    /// Flattened, alphabetically sorted sub-county names for pickers.
    #[must_use]
    pub fn sorted_sub_county_names(&self) -> Vec<&'static str> {
        let mut names = self.sub_counties().map(|sub_county| sub_county.name).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_lists_four_boroughs_and_eleven_sub_counties() {
        let directory = AdministrativeDirectory::nairobi();
        assert_eq!(directory.units().len(), 4);
        assert_eq!(directory.sub_counties().count(), 11);
    }

    #[test]
    fn ward_lookup_is_scoped_to_sub_county() {
        let directory = AdministrativeDirectory::nairobi();
        let Some(westlands) = directory.sub_county("Westlands") else {
            panic!("Westlands should be present");
        };
        assert!(westlands.has_ward("Parklands"));
        assert!(!westlands.has_ward("Kilimani"));
        assert_eq!(directory.wards("Embakasi West").map(<[_]>::len), Some(4));
        assert_eq!(directory.wards("Kilimani"), None);
    }

    #[test]
    fn borough_and_planning_officer_resolve_from_sub_county() {
        let directory = AdministrativeDirectory::nairobi();
        assert_eq!(directory.borough_of("Kibra").map(|unit| unit.borough), Some("Southern"));
        assert_eq!(directory.planning_officer("Dagoretti North"), Some("Waweru Kindiga"));
        assert_eq!(directory.borough("Eastern").map(|unit| unit.manager), Some("George Muca"));
    }

    #[test]
    fn sorted_sub_county_names_are_alphabetical() {
        let names = AdministrativeDirectory::nairobi().sorted_sub_county_names();
        assert_eq!(names.first(), Some(&"Dagoretti North"));
        assert_eq!(names.last(), Some(&"Westlands"));
        let mut resorted = names.clone();
        resorted.sort_unstable();
        assert_eq!(names, resorted);
    }
}
