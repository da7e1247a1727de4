//! Turns validator findings into a refinement instruction for the designer

use crate::workers::{
    BudgetAnalysis, Constraint, ConstraintKind, Modification, Priority, RefinementInstruction,
    ResearchReport, TripParameters,
};

pub fn build_instruction(
    params: &TripParameters,
    budget: &BudgetAnalysis,
    research: &ResearchReport,
) -> RefinementInstruction {
    let savings = budget.savings_identified();
    let shortfall_priority = if savings > 0.0 {
        Priority::High
    } else {
        Priority::Medium
    };

    let mut constraints: Vec<Constraint> = budget
        .allocation
        .iter()
        .filter(|a| !a.sufficient)
        .map(|a| Constraint {
            kind: ConstraintKind::BudgetOptimization,
            priority: shortfall_priority,
            description: format!("Reduce {} spend by {:.0}", a.category, a.shortfall),
            target: Some(a.category.to_string()),
            amount: Some(a.shortfall),
        })
        .collect();

    if savings > 0.0 {
        constraints.push(Constraint {
            kind: ConstraintKind::BudgetOptimization,
            priority: Priority::High,
            description: format!("Apply identified savings of {:.0}", savings),
            target: None,
            amount: Some(savings),
        });
    }

    constraints.extend(research.issues.iter().map(|issue| Constraint {
        kind: ConstraintKind::FactVerification,
        priority: Priority::from(issue.severity),
        description: format!("{}: {}", issue.activity, issue.description),
        target: Some(issue.activity.clone()),
        amount: None,
    }));

    let modifications = research
        .booking_links
        .iter()
        .map(|link| Modification::BookingLink {
            activity: link.activity.clone(),
            url: link.url.clone(),
            platform: link.platform.clone(),
        })
        .collect();

    RefinementInstruction {
        budget: params.budget,
        budget_level: params.budget_level,
        constraints,
        modifications,
    }
}
