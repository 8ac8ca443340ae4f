use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::selectors::SelectorSet;
use crate::webdriver::{BrowserError, FormPage, Launcher, SelectOption};

pub mod extractor_tests;
pub mod fixtures;

/// Helper function to log and save failed HTML for future regression testing
pub fn save_failed_html(html: &str, test_name: &str) -> Result<()> {
    let failures_dir = Path::new("src/tests/fixtures/failures");
    fs::create_dir_all(failures_dir)?;

    let file_path = failures_dir.join(format!("{}.html", test_name));
    fs::write(&file_path, html)?;

    println!("Saved failed HTML to {}", file_path.display());
    Ok(())
}

/// What the fake calculator saw across every session it handed out.
#[derive(Debug, Default)]
pub struct CalculatorLog {
    pub actions: Vec<String>,
    pub opened: usize,
    pub closed: usize,
}

impl CalculatorLog {
    pub fn did(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.actions.iter().filter(|a| a.starts_with(prefix)).count()
    }
}

/// In-memory stand-in for the subsidy calculator.
#[derive(Clone)]
pub struct FakeCalculator {
    pub log: Rc<RefCell<CalculatorLog>>,
    pub selectors: SelectorSet,
    pub results_html: String,
    /// Results page per county option value, for multi-county ZIPs.
    pub county_results: HashMap<String, String>,
    pub counties: Vec<SelectOption>,
    pub form_loads: bool,
    pub results_render: bool,
    pub submit_enabled: bool,
    pub launch_fails: bool,
    /// Selectors that do not exist on the page.
    pub missing: Vec<String>,
}

impl FakeCalculator {
    pub fn new(results_html: &str) -> Self {
        FakeCalculator {
            log: Rc::new(RefCell::new(CalculatorLog::default())),
            selectors: SelectorSet::default(),
            results_html: results_html.to_string(),
            county_results: HashMap::new(),
            counties: Vec::new(),
            form_loads: true,
            results_render: true,
            submit_enabled: true,
            launch_fails: false,
            missing: Vec::new(),
        }
    }

    pub fn with_county(mut self, value: &str, label: &str, results_html: &str) -> Self {
        self.counties.push(SelectOption {
            value: value.to_string(),
            label: label.to_string(),
        });
        self.county_results
            .insert(value.to_string(), results_html.to_string());
        self
    }
}

impl Launcher for FakeCalculator {
    type Page = FakePage;

    fn launch(&self) -> Result<FakePage, BrowserError> {
        if self.launch_fails {
            return Err(BrowserError::Protocol {
                error: "session not created".to_string(),
                message: "chrome not reachable".to_string(),
            });
        }
        self.log.borrow_mut().opened += 1;
        Ok(FakePage {
            calculator: self.clone(),
            county: None,
        })
    }
}

pub struct FakePage {
    calculator: FakeCalculator,
    county: Option<String>,
}

impl FakePage {
    fn record(&self, action: String) {
        self.calculator.log.borrow_mut().actions.push(action);
    }

    fn exists(&self, selector: &str) -> Result<(), BrowserError> {
        if self.calculator.missing.iter().any(|m| m == selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }
}

impl FormPage for FakePage {
    fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.county = None;
        self.record(format!("goto {}", url));
        Ok(())
    }

    fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError> {
        let calc = &self.calculator;
        let visible = if selector == calc.selectors.form {
            calc.form_loads
        } else if selector == calc.selectors.results {
            calc.results_render
        } else if selector == calc.selectors.county {
            !calc.counties.is_empty()
        } else {
            !calc.missing.iter().any(|m| m == selector)
        };
        Ok(visible)
    }

    fn is_enabled(&mut self, selector: &str) -> Result<bool, BrowserError> {
        if selector == self.calculator.selectors.submit {
            return Ok(self.calculator.submit_enabled);
        }
        Ok(!self.calculator.missing.iter().any(|m| m == selector))
    }

    fn options(&mut self, selector: &str) -> Result<Vec<SelectOption>, BrowserError> {
        if selector == self.calculator.selectors.county {
            return Ok(self.calculator.counties.clone());
        }
        Ok(Vec::new())
    }

    fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.exists(selector)?;
        self.record(format!("fill {}={}", selector, value));
        Ok(())
    }

    fn select(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.exists(selector)?;
        if selector == self.calculator.selectors.county {
            self.county = Some(value.to_string());
        }
        self.record(format!("select {}={}", selector, value));
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        self.exists(selector)?;
        self.record(format!("click {}", selector));
        Ok(())
    }

    fn submit_form(&mut self, form_selector: &str) -> Result<(), BrowserError> {
        self.record(format!("submit_form {}", form_selector));
        Ok(())
    }

    fn source(&mut self) -> Result<String, BrowserError> {
        let calc = &self.calculator;
        let html = self
            .county
            .as_ref()
            .and_then(|county| calc.county_results.get(county))
            .unwrap_or(&calc.results_html);
        Ok(html.clone())
    }
}

impl Drop for FakePage {
    fn drop(&mut self) {
        self.calculator.log.borrow_mut().closed += 1;
    }
}
