//! Default step graphs, one builder per process type.
//!
//! Step names are the domain's real labels. Side effects are attached here
//! as [`StepEffect`] variants so advancement logic never matches on names.

use crate::types::{Assignee, Step, StepEffect};

/// 简历筛选 → 初试 → 复试 → 终试 → 发放Offer → 录用确认
pub fn recruitment_steps() -> Vec<Step> {
    vec![
        Step::task("简历筛选", Assignee::role("hr"))
            .with_description("Screen the candidate's resume against the job requirements")
            .with_effect(StepEffect::MarkCandidateInterviewing),
        Step::approval("初试", Assignee::role("tech_interviewer"))
            .with_description("First-round technical interview"),
        Step::approval("复试", Assignee::role("department_manager"))
            .with_description("Second-round interview with the hiring department"),
        Step::approval("终试", Assignee::role("hr_director"))
            .with_description("Final interview"),
        Step::task("发放Offer", Assignee::role("hr"))
            .with_description("Prepare and send the offer")
            .with_effect(StepEffect::MarkCandidateOffered),
        Step::approval("录用确认", Assignee::role("candidate"))
            .with_description("Candidate confirms acceptance"),
    ]
}

/// 入职审批 → HR审批 → 入职准备 → 合同签订 → 入职培训
pub fn onboarding_steps() -> Vec<Step> {
    vec![
        Step::approval("入职审批", Assignee::role("manager")),
        Step::approval("HR审批", Assignee::role("hr")),
        Step::task("入职准备", Assignee::role("admin"))
            .with_description("Workstation, accounts, and equipment"),
        Step::task("合同签订", Assignee::role("hr")),
        Step::task("入职培训", Assignee::role("employee")),
    ]
}

/// 晋升申请 → 直属上级审批 → 部门负责人审批 → HR审批 → 薪资调整 → 晋升生效
pub fn promotion_steps() -> Vec<Step> {
    vec![
        Step::task("晋升申请", Assignee::role("employee")),
        Step::approval("直属上级审批", Assignee::role("manager")),
        Step::approval("部门负责人审批", Assignee::role("department_manager")),
        Step::approval("HR审批", Assignee::role("hr")),
        Step::task("薪资调整", Assignee::role("hr"))
            .with_effect(StepEffect::ApplySalaryChange),
        Step::task("晋升生效", Assignee::role("hr")),
    ]
}

/// 转岗申请 → 原部门审批 → 目标部门审批 → HR审批 → 工作交接 → 转岗生效
pub fn transfer_steps() -> Vec<Step> {
    vec![
        Step::task("转岗申请", Assignee::role("employee")),
        Step::approval("原部门审批", Assignee::role("manager")),
        Step::approval("目标部门审批", Assignee::role("target_department_manager")),
        Step::approval("HR审批", Assignee::role("hr")),
        Step::task("工作交接", Assignee::role("employee")),
        Step::task("转岗生效", Assignee::role("hr")),
    ]
}

/// 调薪申请 → 直属上级审批 → 部门负责人审批 → HR审批 → 薪资生效
pub fn salary_adjustment_steps() -> Vec<Step> {
    vec![
        Step::task("调薪申请", Assignee::role("employee")),
        Step::approval("直属上级审批", Assignee::role("manager")),
        Step::approval("部门负责人审批", Assignee::role("department_manager")),
        Step::approval("HR审批", Assignee::role("hr")),
        Step::task("薪资生效", Assignee::role("hr"))
            .with_effect(StepEffect::ApplySalaryChange),
    ]
}

/// 自评 → 上级评估 → 绩效面谈 → 结果确认
pub fn performance_steps() -> Vec<Step> {
    vec![
        Step::task("自评", Assignee::role("employee"))
            .with_effect(StepEffect::RecordSelfScore),
        Step::approval("上级评估", Assignee::role("manager"))
            .with_effect(StepEffect::RecordReviewerScore),
        Step::task("绩效面谈", Assignee::role("manager")),
        Step::approval("结果确认", Assignee::role("employee")),
    ]
}

/// 离职审批 → HR审批 → 工作交接 → 资产归还 → 离职面谈 → 离职手续办理
pub fn resignation_steps() -> Vec<Step> {
    vec![
        Step::approval("离职审批", Assignee::role("manager"))
            .with_effect(StepEffect::RecordResignationApproval),
        Step::approval("HR审批", Assignee::role("hr")),
        Step::task("工作交接", Assignee::role("employee")),
        Step::task("资产归还", Assignee::role("admin")),
        Step::task("离职面谈", Assignee::role("hr")),
        Step::task("离职手续办理", Assignee::role("hr")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StepKind, StepStatus};

    #[test]
    fn test_recruitment_graph_shape() {
        let steps = recruitment_steps();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0].name, "简历筛选");
        assert_eq!(steps[0].kind, StepKind::Task);
        assert_eq!(steps[0].effect, StepEffect::MarkCandidateInterviewing);
        assert_eq!(steps[4].effect, StepEffect::MarkCandidateOffered);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_salary_effects_attached() {
        assert_eq!(
            promotion_steps()[4].effect,
            StepEffect::ApplySalaryChange
        );
        assert_eq!(
            salary_adjustment_steps()[4].effect,
            StepEffect::ApplySalaryChange
        );
    }

    #[test]
    fn test_step_ids_unique_within_graph() {
        let steps = resignation_steps();
        let mut ids: Vec<_> = steps.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), steps.len());
    }
}
